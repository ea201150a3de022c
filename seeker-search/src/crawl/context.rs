//! Citations and model context built from crawled pages.

use serde::{Deserialize, Serialize};

use crate::crawl::extract::truncate_chars;
use crate::types::{CrawlEngine, CrawledPage};
use crate::url_util;

/// Characters of page text used when a page has no meta description.
const SNIPPET_CHARS: usize = 200;

/// A citation for one successfully crawled page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCitation {
    /// 1-based position of the page in the crawl request.
    pub id: usize,
    pub url: String,
    pub root_url: String,
    pub title: String,
    pub snippet: String,
    pub favicon_url: String,
    pub engine: CrawlEngine,
}

/// One citation per successful page. Ids follow request position, so a
/// failed page leaves a gap.
pub fn citations_from_pages(pages: &[CrawledPage]) -> Vec<PageCitation> {
    pages
        .iter()
        .enumerate()
        .filter(|(_, page)| page.is_success())
        .map(|(i, page)| {
            let id = i + 1;
            let snippet = match page.meta_description.as_deref().filter(|d| !d.is_empty()) {
                Some(description) => description.to_owned(),
                None => {
                    let mut s = truncate_chars(&page.content, SNIPPET_CHARS).trim().to_owned();
                    if page.content.chars().count() > SNIPPET_CHARS {
                        s.push_str("...");
                    }
                    s
                }
            };
            PageCitation {
                id,
                url: page.url.clone(),
                root_url: page.root_url.clone(),
                title: page
                    .title
                    .clone()
                    .unwrap_or_else(|| format!("Source {id}")),
                snippet,
                favicon_url: format!("{}/favicon.ico", page.root_url),
                engine: page.engine,
            }
        })
        .collect()
}

/// Render successful pages as attributed context blocks.
///
/// Each block names the bare domain used for citation markers, the full
/// URL and up to `content_per_source` characters of text.
pub fn build_page_context(pages: &[CrawledPage], content_per_source: usize) -> String {
    let citations = citations_from_pages(pages);
    let mut out = String::new();
    for page in pages.iter().filter(|p| p.is_success()) {
        let Some(citation) = citations.iter().find(|c| c.url == page.url) else {
            continue;
        };
        let domain = url_util::bare_host(&page.url).unwrap_or_default();
        let mut content = truncate_chars(&page.content, content_per_source);
        if page.content.chars().count() > content_per_source {
            content.push_str("\n[Content truncated...]");
        }
        out.push_str(&format!("[Source: {domain} - {}]\n", citation.title));
        out.push_str(&format!("Domain for citation: {domain}\n"));
        out.push_str(&format!("Full URL: {}\n", page.url));
        out.push_str(&content);
        out.push_str("\n\n");
    }
    out
}

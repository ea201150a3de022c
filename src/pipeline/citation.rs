//! Citation numbering.

use std::collections::HashSet;

use seeker_search::crawl::extract::truncate_chars;
use seeker_search::url_util::{citation_root_url, normalize_url};
use serde::{Deserialize, Serialize};

use super::sources::{SourceKind, SourceResult};

/// Snippet length carried on a citation.
const CITATION_SNIPPET_CHARS: usize = 200;

/// A numbered reference to one evidence item.
///
/// Ids are only meaningful within the run that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based, contiguous.
    pub id: usize,
    pub url: String,
    /// Scheme and host with `www.` stripped.
    pub root_url: String,
    pub title: String,
    pub snippet: String,
    pub source_type: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
}

/// A citation paired with the evidence it numbers.
#[derive(Debug, Clone, Copy)]
pub struct Cited<'a> {
    pub id: usize,
    pub source: &'a SourceResult,
}

/// Number the usable evidence items in the order given.
///
/// Callers pass web, academic, then video results. Items without content
/// are skipped, and a URL already cited (after normalisation) is not cited
/// twice, so ids stay contiguous from 1.
pub fn number_sources<'a>(sources: impl IntoIterator<Item = &'a SourceResult>) -> Vec<Cited<'a>> {
    let mut seen = HashSet::new();
    let mut cited = Vec::new();
    for source in sources {
        if !source.has_content() {
            continue;
        }
        if !source.url.is_empty() && !seen.insert(normalize_url(&source.url)) {
            tracing::debug!(url = %source.url, "duplicate source skipped");
            continue;
        }
        cited.push(Cited {
            id: cited.len() + 1,
            source,
        });
    }
    cited
}

impl Cited<'_> {
    /// The citation record streamed to the caller.
    pub fn citation(&self) -> Citation {
        let root_url = citation_root_url(&self.source.url);
        let favicon_url = (!root_url.is_empty()).then(|| format!("{root_url}/favicon.ico"));
        let title = if self.source.title.trim().is_empty() {
            format!("Source {}", self.id)
        } else {
            self.source.title.clone()
        };
        Citation {
            id: self.id,
            url: self.source.url.clone(),
            root_url,
            title,
            snippet: truncate_chars(&self.source.snippet, CITATION_SNIPPET_CHARS),
            source_type: self.source.kind,
            favicon_url,
        }
    }
}

/// Build the citation list for a set of evidence items.
pub fn build_citations<'a>(sources: impl IntoIterator<Item = &'a SourceResult>) -> Vec<Citation> {
    number_sources(sources).iter().map(Cited::citation).collect()
}

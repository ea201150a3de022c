//! HTML content extraction: strips boilerplate and returns readable text.
//!
//! Parses raw HTML, removes non-content elements (scripts, styles,
//! navigation, forms), picks the highest-priority content container and
//! returns clean text suitable for model context.

use scraper::{Html, Selector};

/// Elements removed, with their content, before text extraction.
pub const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "form", "svg",
];

/// Content containers in priority order.
pub const CONTENT_SELECTORS: &[&str] = &["main", "article", "[role=\"main\"]", "body"];

/// Readable parts of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    /// `<title>` text, if non-empty.
    pub title: Option<String>,
    /// Meta description, falling back to `og:description`.
    pub description: Option<String>,
    /// Main text, blank-line runs collapsed, truncated to the limit.
    pub content: String,
}

/// Extract title, description and main text from an HTML document.
///
/// Content is truncated to `max_chars` characters. An empty `content`
/// means nothing readable was found; callers treat that as a failed crawl.
pub fn extract_html(html: &str, max_chars: usize) -> Extracted {
    let head_doc = Html::parse_document(html);
    let title = extract_title(&head_doc);
    let description = extract_description(&head_doc);

    let cleaned = strip_tags(html, BOILERPLATE_TAGS);
    let document = Html::parse_document(&cleaned);
    let text = collapse_blank_lines(&extract_main_text(&document));

    Extracted {
        title,
        description,
        content: truncate_chars(&text, max_chars),
    }
}

/// Treat a non-HTML text body (plain text, markdown, JSON, XML) as content.
pub fn extract_plain_text(body: &str, max_chars: usize) -> Extracted {
    Extracted {
        title: None,
        description: None,
        content: truncate_chars(&collapse_blank_lines(body), max_chars),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let Ok(selector) = Selector::parse("title") else {
        return None;
    };
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_owned())
        .filter(|t| !t.is_empty())
}

fn extract_description(document: &Html) -> Option<String> {
    ["meta[name=\"description\"]", "meta[property=\"og:description\"]"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| {
            document
                .select(&selector)
                .filter_map(|el| el.value().attr("content"))
                .map(|c| c.trim().to_owned())
                .find(|c| !c.is_empty())
        })
}

/// Text of the first non-empty container in [`CONTENT_SELECTORS`] order,
/// one trimmed text node per line.
fn extract_main_text(document: &Html) -> String {
    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element
                .text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            if !text.is_empty() {
                return text;
            }
        }
    }

    String::new()
}

/// Remove every listed element, including its content, from raw HTML.
pub(crate) fn strip_tags(html: &str, tags: &[&str]) -> String {
    let mut result = html.to_owned();
    for tag in tags {
        result = strip_tag(&result, tag);
    }
    result
}

/// Remove all instances of a specific HTML tag and its content.
fn strip_tag(html: &str, tag: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let lower = html.to_ascii_lowercase();
    let open_tag = format!("<{tag}");
    let close_tag = format!("</{tag}>");

    let mut pos = 0;
    loop {
        let start = match lower[pos..].find(&open_tag) {
            Some(offset) => pos + offset,
            None => {
                result.push_str(&html[pos..]);
                break;
            }
        };

        // Reject prefixes of longer names, e.g. <navigate> for <nav>.
        let after_tag = start + open_tag.len();
        if after_tag < lower.len() {
            let next_byte = lower.as_bytes()[after_tag];
            if !matches!(next_byte, b' ' | b'>' | b'/' | b'\n' | b'\r' | b'\t') {
                result.push_str(&html[pos..after_tag]);
                pos = after_tag;
                continue;
            }
        }

        result.push_str(&html[pos..start]);

        let end = match lower[start..].find(&close_tag) {
            Some(offset) => start + offset + close_tag.len(),
            None => match lower[start..].find('>') {
                Some(offset) => start + offset + 1,
                None => html.len(),
            },
        };

        pos = end;
    }

    result
}

/// Trim every line, squeeze inner whitespace and collapse runs of blank
/// lines to a single blank line.
pub fn collapse_blank_lines(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut blank_run = false;
    for line in text.lines() {
        let squeezed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if squeezed.is_empty() {
            if !out.is_empty() {
                blank_run = true;
            }
            continue;
        }
        if blank_run {
            out.push(String::new());
            blank_run = false;
        }
        out.push(squeezed);
    }
    out.join("\n")
}

/// Truncate to `max_chars` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_owned(),
        None => text.to_owned(),
    }
}

//! Grounding prompt assembly.
//!
//! The system prompt is a fixed citation instruction block followed by the
//! evidence, grouped by source kind and wrapped in `--- SOURCES ---`
//! markers. Every item carries the citation id streamed to the caller.

use std::fmt::Write as _;

use seeker_search::crawl::extract::truncate_chars;
use seeker_search::url_util::bare_host;

use super::citation::Cited;
use super::retriever::RetrievedContext;
use super::sources::SourceKind;
use crate::llm::{Message, Role};

const SYNTHESIS_PROMPT: &str = "You are a research assistant. Answer the user's question from the sources below.

## Citations
1. Cite inline with the exact form 【domain.com】 using the 【 and 】 brackets, never [ ].
2. Take the domain from the source's Domain line.
3. Put the citation directly after the fact it supports. Several may follow one claim: 【a.com】【b.org】.
4. Only cite information that comes from a listed source.
5. Cite papers as 【arxiv.org】 and videos as 【youtube.com】.

## Formatting
- Use **bold** for key terms and `code` for identifiers or commands.
- Use fenced code blocks with a language tag.
- Organise longer answers with ## headings and lists.
- Quote sources with > blockquotes.

## Honesty
- If the sources do not cover the question, say so plainly.
- Prefer academic sources for factual claims when they are available.";

const WEB_CONTENT_CHARS: usize = 1500;
const ACADEMIC_CONTENT_CHARS: usize = 2000;
const VIDEO_CONTENT_CHARS: usize = 2000;
const CONTEXT_CONTENT_CHARS: usize = 1000;
const MAX_LISTED_AUTHORS: usize = 3;

fn domain_of(url: &str) -> String {
    bare_host(url).unwrap_or_else(|| url.to_owned())
}

/// Render the evidence sections.
///
/// Crawled pages (web items carrying an `engine` tag) keep up to
/// `page_content_chars`; search snippets keep less.
pub fn build_source_context(
    evidence: &[Cited<'_>],
    context: &[RetrievedContext],
    page_content_chars: usize,
) -> String {
    let mut out = String::new();

    let of_kind = |kind: SourceKind| evidence.iter().filter(move |c| c.source.kind == kind);

    let mut web = of_kind(SourceKind::Web).peekable();
    if web.peek().is_some() {
        out.push_str("## Web Sources\n");
        for cited in web {
            let s = cited.source;
            let cap = if s.metadata.contains_key("engine") {
                page_content_chars
            } else {
                WEB_CONTENT_CHARS
            };
            let _ = writeln!(
                out,
                "Source [{}] (Web):\n- URL: {}\n- Domain: {}\n- Title: {}\n- Content: {}\n",
                cited.id,
                s.url,
                domain_of(&s.url),
                s.title,
                truncate_chars(&s.content, cap)
            );
        }
    }

    let mut academic = of_kind(SourceKind::Arxiv).peekable();
    if academic.peek().is_some() {
        out.push_str("## Academic Sources\n");
        for cited in academic {
            let s = cited.source;
            let authors = s
                .authors
                .iter()
                .take(MAX_LISTED_AUTHORS)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                out,
                "Source [{}] (Academic - arXiv):\n- Title: {}\n- Authors: {}\n- Published: {}\n- URL: {}\n- Domain: arxiv.org\n- Abstract: {}\n",
                cited.id,
                s.title,
                authors,
                s.published,
                s.url,
                truncate_chars(&s.content, ACADEMIC_CONTENT_CHARS)
            );
        }
    }

    let mut video = of_kind(SourceKind::Youtube).peekable();
    if video.peek().is_some() {
        out.push_str("## Video Sources\n");
        for cited in video {
            let s = cited.source;
            let _ = writeln!(
                out,
                "Source [{}] (YouTube):\n- Title: {}\n- Channel: {}\n- URL: {}\n- Domain: youtube.com\n- Transcript excerpt: {}\n",
                cited.id,
                s.title,
                s.authors.join(", "),
                s.url,
                truncate_chars(&s.content, VIDEO_CONTENT_CHARS)
            );
        }
    }

    if !context.is_empty() {
        out.push_str("## Previous Context\n");
        for (i, ctx) in context.iter().enumerate() {
            let _ = writeln!(
                out,
                "Context [{}]:\n- Source: {}\n- Content: {}\n",
                i + 1,
                ctx.source.as_str(),
                truncate_chars(&ctx.content, CONTEXT_CONTENT_CHARS)
            );
        }
    }

    out
}

/// Full system prompt: instructions, custom instructions, then evidence.
pub fn build_system_prompt(
    evidence: &[Cited<'_>],
    context: &[RetrievedContext],
    custom_instructions: Option<&str>,
    page_content_chars: usize,
) -> String {
    let mut prompt = SYNTHESIS_PROMPT.to_owned();
    if let Some(extra) = custom_instructions.map(str::trim).filter(|s| !s.is_empty()) {
        let _ = write!(prompt, "\n\nAdditional instructions: {extra}");
    }
    let sources = build_source_context(evidence, context, page_content_chars);
    let _ = write!(prompt, "\n\n--- SOURCES ---\n{sources}\n--- END SOURCES ---");
    prompt
}

/// Messages sent to the model: system prompt, prior turns, then the query.
///
/// System turns in the history are dropped.
pub fn build_messages(system_prompt: String, history: &[Message], query: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system_prompt));
    messages.extend(history.iter().filter(|m| m.role != Role::System).cloned());
    messages.push(Message::user(query));
    messages
}

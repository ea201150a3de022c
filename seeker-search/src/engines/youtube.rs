//! YouTube video search with best-effort transcripts.
//!
//! Uses the YouTube Data API v3 when an API key is configured and falls
//! back to a DuckDuckGo search scoped to `site:youtube.com` otherwise, or
//! when the API call fails. Transcripts come from the caption track
//! advertised on the watch page and are fetched concurrently.

use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use url::Url;

use crate::crawl::extract::truncate_chars;
use crate::config::SearchConfig;
use crate::engines::DuckDuckGoEngine;
use crate::error::SearchError;
use crate::http;
use crate::types::Video;

/// YouTube search client.
pub struct YouTubeEngine;

#[derive(Debug, Deserialize)]
struct ApiSearchResponse {
    #[serde(default)]
    items: Vec<ApiItem>,
}

#[derive(Debug, Deserialize)]
struct ApiItem {
    id: ApiItemId,
    snippet: ApiSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    description: String,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    #[serde(default)]
    language_code: String,
}

impl YouTubeEngine {
    /// Search for up to `limit` videos and attach transcripts where possible.
    ///
    /// # Errors
    ///
    /// Returns an error only when both the API path (if configured) and the
    /// site-scoped web fallback fail. Transcript failures never fail the search.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        config: &SearchConfig,
    ) -> Result<Vec<Video>, SearchError> {
        let client = http::build_client(
            Duration::from_secs(config.timeout_seconds),
            config.user_agent.as_deref(),
        )?;

        let mut videos = match config.youtube_api_key() {
            Some(key) => match self.search_api(&client, query, limit, &key, config).await {
                Ok(videos) => videos,
                Err(err) => {
                    tracing::warn!(error = %err, "YouTube API search failed, using web fallback");
                    self.search_via_web(query, limit, config).await?
                }
            },
            None => self.search_via_web(query, limit, config).await?,
        };

        let transcripts = futures::future::join_all(
            videos
                .iter()
                .map(|v| transcript_with(&client, &v.video_id, config)),
        )
        .await;

        for (video, transcript) in videos.iter_mut().zip(transcripts) {
            match transcript {
                Ok(text) => video.transcript = text,
                Err(err) => {
                    tracing::debug!(video_id = %video.video_id, error = %err, "transcript unavailable");
                }
            }
        }

        Ok(videos)
    }

    async fn search_api(
        &self,
        client: &reqwest::Client,
        query: &str,
        limit: usize,
        api_key: &str,
        config: &SearchConfig,
    ) -> Result<Vec<Video>, SearchError> {
        let max_results = limit.to_string();
        let url = format!("{}/search", config.endpoints.youtube_api.trim_end_matches('/'));

        let response: ApiSearchResponse = client
            .get(&url)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("q", query),
                ("maxResults", max_results.as_str()),
                ("key", api_key),
            ])
            .send()
            .await
            .map_err(|e| http::map_reqwest_error("YouTube API request failed", e))?
            .error_for_status()
            .map_err(|e| SearchError::Http(format!("YouTube API HTTP error: {e}")))?
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("YouTube API response: {e}")))?;

        let videos: Vec<Video> = response
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                Some(Video {
                    url: watch_url(&video_id),
                    video_id,
                    title: item.snippet.title,
                    channel: item.snippet.channel_title,
                    description: item.snippet.description,
                    published: item.snippet.published_at,
                    transcript: None,
                })
            })
            .take(limit)
            .collect();

        tracing::debug!(count = videos.len(), "YouTube API results");
        Ok(videos)
    }

    async fn search_via_web(
        &self,
        query: &str,
        limit: usize,
        config: &SearchConfig,
    ) -> Result<Vec<Video>, SearchError> {
        let scoped = format!("site:youtube.com {query}");
        let hits = DuckDuckGoEngine
            .search(&scoped, config.web_max_results.max(limit), config)
            .await?;

        let mut videos: Vec<Video> = Vec::new();
        for hit in hits {
            let Some(video_id) = extract_video_id(&hit.url) else {
                continue;
            };
            if videos.iter().any(|v| v.video_id == video_id) {
                continue;
            }
            let title = hit
                .title
                .strip_suffix(" - YouTube")
                .unwrap_or(&hit.title)
                .to_owned();
            videos.push(Video {
                url: watch_url(&video_id),
                video_id,
                title,
                channel: String::new(),
                description: hit.snippet,
                published: None,
                transcript: None,
            });
            if videos.len() >= limit {
                break;
            }
        }

        tracing::debug!(count = videos.len(), "YouTube web fallback results");
        Ok(videos)
    }
}

/// Canonical watch URL for a video id.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Extract the video id from the common YouTube URL shapes:
/// `watch?v=`, `youtu.be/`, `/embed/` and `/shorts/`.
pub fn extract_video_id(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let host = host.strip_prefix("m.").unwrap_or(host);

    let candidate = match host {
        "youtu.be" => parsed.path_segments()?.next().map(str::to_owned),
        "youtube.com" | "music.youtube.com" => {
            let mut segments = parsed.path_segments()?;
            match segments.next() {
                Some("watch") => parsed
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("embed") | Some("shorts") | Some("v") => segments.next().map(str::to_owned),
                _ => None,
            }
        }
        _ => None,
    }?;

    let valid = candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(candidate)
}

/// Fetch a transcript for `video_id`, capped at `transcript_max_chars`.
///
/// Returns `Ok(None)` when the video has no caption track.
///
/// # Errors
///
/// Returns an error when the watch page or the caption track cannot be
/// fetched or parsed.
pub async fn fetch_transcript(
    video_id: &str,
    config: &SearchConfig,
) -> Result<Option<String>, SearchError> {
    let client = http::build_client(
        Duration::from_secs(config.timeout_seconds),
        config.user_agent.as_deref(),
    )?;
    transcript_with(&client, video_id, config).await
}

async fn transcript_with(
    client: &reqwest::Client,
    video_id: &str,
    config: &SearchConfig,
) -> Result<Option<String>, SearchError> {
    let site = config.endpoints.youtube_site.trim_end_matches('/');

    let page = client
        .get(format!("{site}/watch"))
        .query(&[("v", video_id)])
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await
        .map_err(|e| http::map_reqwest_error("watch page request failed", e))?
        .error_for_status()
        .map_err(|e| SearchError::Http(format!("watch page HTTP error: {e}")))?
        .text()
        .await
        .map_err(|e| http::map_reqwest_error("watch page read failed", e))?;

    let Some(tracks) = caption_tracks(&page)? else {
        return Ok(None);
    };
    let Some(track) = tracks
        .iter()
        .find(|t| t.language_code.starts_with("en"))
        .or_else(|| tracks.first())
    else {
        return Ok(None);
    };

    let track_url = if track.base_url.starts_with('/') {
        format!("{site}{}", track.base_url)
    } else {
        track.base_url.clone()
    };

    let xml = client
        .get(&track_url)
        .send()
        .await
        .map_err(|e| http::map_reqwest_error("caption track request failed", e))?
        .error_for_status()
        .map_err(|e| SearchError::Http(format!("caption track HTTP error: {e}")))?
        .text()
        .await
        .map_err(|e| http::map_reqwest_error("caption track read failed", e))?;

    let text = parse_timed_text(&xml)?;
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(truncate_chars(&text, config.transcript_max_chars)))
}

/// Locate the `captionTracks` JSON array embedded in a watch page.
fn caption_tracks(page: &str) -> Result<Option<Vec<CaptionTrack>>, SearchError> {
    const MARKER: &str = "\"captionTracks\":";
    let Some(start) = page.find(MARKER).map(|i| i + MARKER.len()) else {
        return Ok(None);
    };
    let rest = &page[start..];
    if !rest.starts_with('[') {
        return Ok(None);
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut end = None;
    for (i, ch) in rest.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(i + 1);
                    break;
                }
            }
            _ => {}
        }
    }

    let Some(end) = end else {
        return Err(SearchError::Parse("unterminated captionTracks array".into()));
    };
    serde_json::from_str(&rest[..end])
        .map(Some)
        .map_err(|e| SearchError::Parse(format!("captionTracks: {e}")))
}

/// Join the `<text>` cues of a timed-text document into one string.
fn parse_timed_text(xml: &str) -> Result<String, SearchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut cues: Vec<String> = Vec::new();
    let mut in_cue = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"text" => in_cue = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"text" => in_cue = false,
            Ok(Event::Text(te)) if in_cue => {
                let once = te
                    .unescape()
                    .map_err(|e| SearchError::Parse(format!("timed text: {e}")))?;
                // Caption text is frequently escaped twice.
                let twice = quick_xml::escape::unescape(&once)
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| once.into_owned());
                let cue = twice.split_whitespace().collect::<Vec<_>>().join(" ");
                if !cue.is_empty() {
                    cues.push(cue);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SearchError::Parse(format!("timed text: {e}"))),
        }
        buf.clear();
    }

    Ok(cues.join(" "))
}

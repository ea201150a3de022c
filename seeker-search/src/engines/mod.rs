//! Source search engines.
//!
//! Each module provides a unit struct with an async `search` method that
//! queries one external service and parses its response.

pub mod arxiv;
pub mod duckduckgo;
pub mod youtube;

pub use arxiv::ArxivEngine;
pub use duckduckgo::DuckDuckGoEngine;
pub use youtube::YouTubeEngine;

pub mod actions;
pub mod error;
pub mod scrape;
pub mod search;
pub mod validate;

pub use actions::{ActionConfig, ActionDispatcher, HttpActionDispatcher};
pub use error::ToolError;
pub use scrape::{BrowserScraper, PageScraper, ScrapeConfig};
pub use search::{DuckDuckGoClient, SearchClient, SearchHit};
pub use validate::{validate_mission_input, validate_url, validate_url_syntax};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unsafe URL: {0}")]
    UnsafeUrl(String),

    #[error("Scrape failed: {0}")]
    ScrapeFailed(String),

    #[error("Search failed: {0}")]
    SearchFailed(String),

    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;

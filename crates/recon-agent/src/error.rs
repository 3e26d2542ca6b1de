use thiserror::Error;

#[derive(Error, Debug)]
pub enum MissionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    #[error("Mission cancelled")]
    Cancelled,

    #[error("Persistence error: {0}")]
    Persist(#[from] recon_persist::PersistError),
}

pub type Result<T> = std::result::Result<T, MissionError>;

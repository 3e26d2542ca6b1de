pub mod error;
pub mod events;
pub mod intel;
pub mod mission;
pub mod plan;
pub mod prompts;
pub mod runner;

pub use error::MissionError;
pub use events::{EventSink, MissionEvent};
pub use intel::{contains_price_signal, has_price_intent, IntelPool, IntelRecord};
pub use mission::{MissionExecutor, MissionOutcome, TraceEntry};
pub use plan::{parse_plan, PlanStep, Planner, ToolKind};
pub use runner::{MissionHandle, MissionRunner};

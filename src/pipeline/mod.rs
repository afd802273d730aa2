pub mod events;
pub mod followup;
pub mod generator;
pub mod orchestrator;

pub use events::{DoneStatus, FollowUpSet, StreamEvent};
pub use orchestrator::{AnswerPipeline, TurnStream};

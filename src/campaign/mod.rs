//! Campaign: render personalized messages and dispatch them once.

pub mod html;
pub mod render;
pub mod runner;

pub use render::MessageTemplate;
pub use runner::{Campaign, DispatchMode, RecordOutcome, RecordReport, RunMode, RunSummary};

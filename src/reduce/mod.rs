pub mod eligibility;
pub mod inventory;
pub mod orchestrator;
pub mod repair;
pub mod report;

pub use eligibility::{EligibilityFilter, Ineligible};
pub use inventory::{inspect, RenditionInventory};
pub use orchestrator::{Operator, Pacing, Reducer, ReducerSettings, RunMode};
pub use report::{RunSummary, SkipReason, VideoOutcome, VideoReport};

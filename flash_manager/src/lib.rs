pub mod accounting;
pub mod chain;
pub mod constants;
pub mod host;
pub mod journal;
pub mod orchestrator;
pub mod protocol;
pub mod types;
pub mod utils;
pub mod validation;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use orchestrator::{settings::Settings, stage::RunStage, Orchestrator};
pub use utils::error::{OrchestratorError, OrchestratorResult};

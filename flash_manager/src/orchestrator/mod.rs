pub mod admin;
pub mod data;
pub mod executable;
pub mod lock;
pub mod settings;
pub mod stage;

pub use executable::Orchestrator;

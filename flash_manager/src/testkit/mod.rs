//! In-memory collaborators for tests and the demo binary
//!
//! - [`pool::SimLendingPool`]: a minimal lending pool whose whole state lives on the
//!   [`Chain`](crate::chain::Chain), so a reverted run rolls the pool back too.
//! - [`executor::ScriptedExecutor`]: an executor whose behaviour is chosen per test.
//! - [`fixture::Deployment`]: a chain with a collateral/borrow market and a deployed orchestrator.

pub mod executor;
pub mod fixture;
pub mod pool;

//! Pre-flight checks on run parameters. Runs before any external call is issued.

use alloy_primitives::U256;

use crate::{
    host::Host,
    types::RunParameters,
    utils::error::{OrchestratorError, OrchestratorResult},
};

/// Checks, in order: both amounts are non-zero, the executor address is non-null
/// and the executor address holds code.
pub fn validate_run(params: &RunParameters, host: &dyn Host) -> OrchestratorResult<()> {
    if params.collateral_amount == U256::ZERO {
        return Err(OrchestratorError::InvalidAmount("collateralAmount"));
    }
    if params.borrow_amount == U256::ZERO {
        return Err(OrchestratorError::InvalidAmount("borrowAmount"));
    }
    if params.executor.is_zero() {
        return Err(OrchestratorError::InvalidAddress("targetWallet"));
    }
    if !host.is_contract(params.executor) {
        return Err(OrchestratorError::TargetMustBeContract(params.executor));
    }
    Ok(())
}

//! Owner-gated administration. Independent of runs.

use alloy_primitives::{Address, U256};

use crate::{
    host::atomically,
    journal::OrchestratorEvent,
    utils::{
        common::only_owner,
        error::{OrchestratorError, OrchestratorResult},
    },
};

use super::Orchestrator;

impl Orchestrator {
    /// Replaces the advisory profit threshold.
    pub fn set_threshold(&self, caller: Address, value: U256) -> OrchestratorResult<()> {
        only_owner(self.config.owner(), caller)?;

        let old = self.data.borrow_mut().replace_profit_threshold(value);
        self.emit(OrchestratorEvent::ThresholdUpdated { old, new: value });
        Ok(())
    }

    /// Sends `amount` of `token` held by the orchestrator to the owner.
    pub fn sweep(&self, caller: Address, token: Address, amount: U256) -> OrchestratorResult<()> {
        only_owner(self.config.owner(), caller)?;
        if token.is_zero() {
            return Err(OrchestratorError::InvalidAddress("token"));
        }
        if amount == U256::ZERO {
            return Err(OrchestratorError::InvalidAmount("amount"));
        }

        atomically(self.host.as_ref(), || {
            self.host
                .transfer(token, self.address, self.config.owner(), amount)?;
            self.emit(OrchestratorEvent::Swept {
                token,
                amount,
                timestamp: self.host.timestamp(),
            });
            Ok(())
        })
    }
}

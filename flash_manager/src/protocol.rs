//! Capability interfaces at the orchestrator's seams
//!
//! Every external party is reached through one of these narrow traits, so the
//! orchestrator never depends on a collaborator's internal structure. Each
//! method receives the immediate `caller`, which is how the callee tells who is
//! talking to it.

use alloy_primitives::{Address, U256};

use crate::{
    types::{AccountHealth, InterestRateMode},
    utils::error::OrchestratorResult,
};

/// Pluggable profit-generating agent.
///
/// Contract: before returning `Ok(true)`, transfer at least `required_return`
/// of `asset` back to `caller`.
#[cfg_attr(test, mockall::automock)]
pub trait Executor {
    fn execute(
        &self,
        caller: Address,
        asset: Address,
        amount: U256,
        required_return: U256,
    ) -> OrchestratorResult<bool>;
}

/// Receiver of a flash borrow. Invoked by the lending protocol mid-loan.
pub trait FlashLoanReceiver {
    /// The receiver's own address on the host
    fn address(&self) -> Address;

    fn on_loan_received(
        &self,
        caller: Address,
        asset: Address,
        amount: U256,
        premium: U256,
        initiator: Address,
        params: &[u8],
    ) -> OrchestratorResult<bool>;
}

/// Lending protocol capabilities consumed by the orchestrator
#[cfg_attr(test, mockall::automock)]
pub trait LendingPool {
    fn address(&self) -> Address;

    /// Lends `amount` of `asset` to `receiver`, resumes it through
    /// [`FlashLoanReceiver::on_loan_received`] and then pulls back `amount + premium`.
    fn flash_borrow(
        &self,
        caller: Address,
        receiver: &dyn FlashLoanReceiver,
        asset: Address,
        amount: U256,
        params: &[u8],
        referral: u16,
    ) -> OrchestratorResult<()>;

    fn supply(
        &self,
        caller: Address,
        asset: Address,
        amount: U256,
        on_behalf_of: Address,
        referral: u16,
    ) -> OrchestratorResult<()>;

    fn set_collateral_flag(
        &self,
        caller: Address,
        asset: Address,
        enabled: bool,
    ) -> OrchestratorResult<()>;

    fn borrow(
        &self,
        caller: Address,
        asset: Address,
        amount: U256,
        rate_mode: InterestRateMode,
        referral: u16,
        on_behalf_of: Address,
    ) -> OrchestratorResult<()>;

    /// `amount == U256::MAX` repays everything outstanding. Returns the amount repaid.
    fn repay(
        &self,
        caller: Address,
        asset: Address,
        amount: U256,
        rate_mode: InterestRateMode,
        on_behalf_of: Address,
    ) -> OrchestratorResult<U256>;

    /// Returns the amount withdrawn
    fn withdraw(
        &self,
        caller: Address,
        asset: Address,
        amount: U256,
        to: Address,
    ) -> OrchestratorResult<U256>;

    fn query_account(&self, who: Address) -> OrchestratorResult<AccountHealth>;
}

//! Hosting execution platform
//!
//! Everything the orchestrator touches outside its own fields goes through
//! [`Host`]: token balances, allowances, contract storage, contract dispatch and
//! the event log. The platform's one hard guarantee is all-or-nothing execution:
//!
//! ```plain
//!   checkpoint ──► run ──┬── Ok  ──► commit     (effects kept)
//!                        └── Err ──► revert_to  (every effect since checkpoint undone)
//! ```

use std::rc::Rc;

use alloy_primitives::{Address, B256, U256};
use tracing::warn;

use crate::{journal::JournalEntry, protocol::Executor, utils::error::OrchestratorResult};

/// Position in the platform's undo log
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint(pub(crate) usize);

pub trait Host {
    /// Current block timestamp in seconds
    fn timestamp(&self) -> u64;

    fn balance_of(&self, token: Address, account: Address) -> U256;
    fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256;
    fn transfer(
        &self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> OrchestratorResult<()>;
    fn approve(&self, token: Address, owner: Address, spender: Address, amount: U256);
    /// Moves `amount` from `from` to `to`, spending `spender`'s allowance
    fn transfer_from(
        &self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> OrchestratorResult<()>;
    fn mint(&self, token: Address, to: Address, amount: U256) -> OrchestratorResult<()>;
    fn burn(&self, token: Address, from: Address, amount: U256) -> OrchestratorResult<()>;

    /// Contract storage slot read
    fn load(&self, contract: Address, slot: B256) -> U256;
    /// Contract storage slot write
    fn store(&self, contract: Address, slot: B256, value: U256);

    /// Returns `true` if `account` holds code
    fn is_contract(&self, account: Address) -> bool;
    /// Resolves the executor behaviour deployed at `account`
    fn executor_at(&self, account: Address) -> Option<Rc<dyn Executor>>;

    fn emit(&self, entry: JournalEntry);
    fn events(&self) -> Vec<JournalEntry>;

    fn checkpoint(&self) -> Checkpoint;
    fn revert_to(&self, checkpoint: Checkpoint);
    fn commit(&self, checkpoint: Checkpoint);
}

/// Open checkpoint that reverts on drop unless committed.
/// Covers the unwinding path as well as the error path.
struct Rollback<'a> {
    host: &'a dyn Host,
    checkpoint: Checkpoint,
    committed: bool,
}

impl<'a> Rollback<'a> {
    fn open(host: &'a dyn Host) -> Self {
        Self {
            host,
            checkpoint: host.checkpoint(),
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
        self.host.commit(self.checkpoint);
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if std::thread::panicking() {
            warn!("Unwinding, reverting every effect since {:?}", self.checkpoint);
        }
        self.host.revert_to(self.checkpoint);
    }
}

/// Runs `f` as one all-or-nothing unit on `host`.
/// If `f` fails or panics, every effect it performed is discarded. Errors are returned unchanged.
pub fn atomically<T, F>(host: &dyn Host, f: F) -> OrchestratorResult<T>
where
    F: FnOnce() -> OrchestratorResult<T>,
{
    let rollback = Rollback::open(host);
    match f() {
        Ok(value) => {
            rollback.commit();
            Ok(value)
        }
        Err(err) => {
            warn!(error = %err, "Reverting every effect since {:?}", rollback.checkpoint);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{chain::Chain, utils::error::OrchestratorError};
    use std::panic::AssertUnwindSafe;

    #[test]
    fn test_commit_keeps_effects() {
        let chain = Chain::new(0);
        let token = Address::repeat_byte(0x01);
        let alice = Address::repeat_byte(0x0a);

        let result = atomically(&chain, || chain.mint(token, alice, U256::from(5u64)));

        assert!(result.is_ok());
        assert_eq!(chain.balance_of(token, alice), U256::from(5u64));
    }

    #[test]
    fn test_error_discards_effects() {
        let chain = Chain::new(0);
        let token = Address::repeat_byte(0x01);
        let alice = Address::repeat_byte(0x0a);
        let bob = Address::repeat_byte(0x0b);
        chain.mint(token, alice, U256::from(5u64)).unwrap();

        let result: OrchestratorResult<()> = atomically(&chain, || {
            chain.transfer(token, alice, bob, U256::from(3u64))?;
            chain.approve(token, bob, alice, U256::from(1u64));
            Err(OrchestratorError::AuthorizationDenied)
        });

        assert_eq!(result, Err(OrchestratorError::AuthorizationDenied));
        assert_eq!(chain.balance_of(token, alice), U256::from(5u64));
        assert_eq!(chain.balance_of(token, bob), U256::ZERO);
        assert_eq!(chain.allowance(token, bob, alice), U256::ZERO);
    }

    #[test]
    fn test_panic_discards_effects() {
        let chain = Chain::new(0);
        let token = Address::repeat_byte(0x01);
        let alice = Address::repeat_byte(0x0a);
        let bob = Address::repeat_byte(0x0b);
        chain.mint(token, alice, U256::from(5u64)).unwrap();

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            atomically(&chain, || -> OrchestratorResult<()> {
                chain.transfer(token, alice, bob, U256::from(3u64))?;
                panic!("executor blew up");
            })
        }));

        assert!(outcome.is_err());
        assert_eq!(chain.balance_of(token, alice), U256::from(5u64));
        assert_eq!(chain.balance_of(token, bob), U256::ZERO);
        assert_eq!(chain.pending_undo(), 0);
    }
}

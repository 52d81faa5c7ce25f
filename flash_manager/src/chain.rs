//! In-memory journaled ledger
//!
//! Implements [`Host`] by recording an undo record for every mutation made while
//! a checkpoint is open. Reverting pops those records and applies them in strict
//! reverse order, so a failed run leaves balances, allowances, storage and the
//! event log exactly as they were at the checkpoint.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

use alloy_primitives::{Address, B256, U256};
use tracing::debug;

use crate::{
    host::{Checkpoint, Host},
    journal::JournalEntry,
    protocol::Executor,
    utils::error::{arithmetic_err, OrchestratorError, OrchestratorResult},
};

/// Compensating action for one mutation
#[derive(Clone, Debug)]
enum Undo {
    Balance {
        token: Address,
        account: Address,
        previous: U256,
    },
    Allowance {
        token: Address,
        owner: Address,
        spender: Address,
        previous: U256,
    },
    Storage {
        contract: Address,
        slot: B256,
        previous: U256,
    },
    Event,
}

#[derive(Default)]
struct Ledger {
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    storage: HashMap<(Address, B256), U256>,
    events: Vec<JournalEntry>,
    undo: Vec<Undo>,
    /// Number of open checkpoints
    depth: usize,
}

impl Ledger {
    fn record(&mut self, undo: Undo) {
        if self.depth > 0 {
            self.undo.push(undo);
        }
    }

    fn balance(&self, token: Address, account: Address) -> U256 {
        self.balances
            .get(&(token, account))
            .copied()
            .unwrap_or_default()
    }

    fn set_balance(&mut self, token: Address, account: Address, value: U256) {
        let previous = self.balance(token, account);
        self.record(Undo::Balance {
            token,
            account,
            previous,
        });
        self.balances.insert((token, account), value);
    }

    fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default()
    }

    fn set_allowance(&mut self, token: Address, owner: Address, spender: Address, value: U256) {
        let previous = self.allowance(token, owner, spender);
        self.record(Undo::Allowance {
            token,
            owner,
            spender,
            previous,
        });
        self.allowances.insert((token, owner, spender), value);
    }

    fn debit(&mut self, token: Address, account: Address, amount: U256) -> OrchestratorResult<()> {
        let available = self.balance(token, account);
        let remaining =
            available
                .checked_sub(amount)
                .ok_or(OrchestratorError::InsufficientBalance {
                    token,
                    account,
                    needed: amount,
                    available,
                })?;
        self.set_balance(token, account, remaining);
        Ok(())
    }

    fn credit(&mut self, token: Address, account: Address, amount: U256) -> OrchestratorResult<()> {
        let updated = self
            .balance(token, account)
            .checked_add(amount)
            .ok_or(arithmetic_err("Balance overflowed."))?;
        self.set_balance(token, account, updated);
        Ok(())
    }

    fn apply(&mut self, undo: Undo) {
        match undo {
            Undo::Balance {
                token,
                account,
                previous,
            } => {
                self.balances.insert((token, account), previous);
            }
            Undo::Allowance {
                token,
                owner,
                spender,
                previous,
            } => {
                self.allowances.insert((token, owner, spender), previous);
            }
            Undo::Storage {
                contract,
                slot,
                previous,
            } => {
                self.storage.insert((contract, slot), previous);
            }
            Undo::Event => {
                self.events.pop();
            }
        }
    }
}

/// Single-threaded in-memory chain
pub struct Chain {
    timestamp: Cell<u64>,
    ledger: RefCell<Ledger>,
    /// Addresses holding code, with the executor behaviour deployed there (if any)
    contracts: RefCell<HashMap<Address, Option<Rc<dyn Executor>>>>,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new(chrono::Utc::now().timestamp().max(0) as u64)
    }
}

impl Chain {
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp: Cell::new(timestamp),
            ledger: RefCell::new(Ledger::default()),
            contracts: RefCell::new(HashMap::new()),
        }
    }

    /// Moves the block timestamp
    pub fn set_timestamp(&self, timestamp: u64) {
        self.timestamp.set(timestamp);
    }

    /// Marks `account` as holding code without any callable executor behaviour
    pub fn register_contract(&self, account: Address) {
        self.contracts.borrow_mut().insert(account, None);
    }

    /// Deploys an executor behaviour at `account`
    pub fn deploy_executor(&self, account: Address, executor: Rc<dyn Executor>) {
        self.contracts.borrow_mut().insert(account, Some(executor));
    }

    /// Number of undo records waiting on open checkpoints
    pub fn pending_undo(&self) -> usize {
        self.ledger.borrow().undo.len()
    }
}

impl Host for Chain {
    fn timestamp(&self) -> u64 {
        self.timestamp.get()
    }

    fn balance_of(&self, token: Address, account: Address) -> U256 {
        self.ledger.borrow().balance(token, account)
    }

    fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.ledger.borrow().allowance(token, owner, spender)
    }

    fn transfer(
        &self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> OrchestratorResult<()> {
        let mut ledger = self.ledger.borrow_mut();
        ledger.debit(token, from, amount)?;
        ledger.credit(token, to, amount)
    }

    fn approve(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.ledger
            .borrow_mut()
            .set_allowance(token, owner, spender, amount);
    }

    fn transfer_from(
        &self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> OrchestratorResult<()> {
        let mut ledger = self.ledger.borrow_mut();
        let available = ledger.allowance(token, from, spender);
        let remaining =
            available
                .checked_sub(amount)
                .ok_or(OrchestratorError::InsufficientAllowance {
                    token,
                    owner: from,
                    spender,
                    needed: amount,
                    available,
                })?;
        ledger.debit(token, from, amount)?;
        ledger.credit(token, to, amount)?;
        // An unlimited approval is never consumed
        if available != U256::MAX {
            ledger.set_allowance(token, from, spender, remaining);
        }
        Ok(())
    }

    fn mint(&self, token: Address, to: Address, amount: U256) -> OrchestratorResult<()> {
        self.ledger.borrow_mut().credit(token, to, amount)
    }

    fn burn(&self, token: Address, from: Address, amount: U256) -> OrchestratorResult<()> {
        self.ledger.borrow_mut().debit(token, from, amount)
    }

    fn load(&self, contract: Address, slot: B256) -> U256 {
        self.ledger
            .borrow()
            .storage
            .get(&(contract, slot))
            .copied()
            .unwrap_or_default()
    }

    fn store(&self, contract: Address, slot: B256, value: U256) {
        let mut ledger = self.ledger.borrow_mut();
        let previous = ledger
            .storage
            .get(&(contract, slot))
            .copied()
            .unwrap_or_default();
        ledger.record(Undo::Storage {
            contract,
            slot,
            previous,
        });
        ledger.storage.insert((contract, slot), value);
    }

    fn is_contract(&self, account: Address) -> bool {
        self.contracts.borrow().contains_key(&account)
    }

    fn executor_at(&self, account: Address) -> Option<Rc<dyn Executor>> {
        self.contracts.borrow().get(&account).cloned().flatten()
    }

    fn emit(&self, entry: JournalEntry) {
        let mut ledger = self.ledger.borrow_mut();
        ledger.record(Undo::Event);
        ledger.events.push(entry);
    }

    fn events(&self) -> Vec<JournalEntry> {
        self.ledger.borrow().events.clone()
    }

    fn checkpoint(&self) -> Checkpoint {
        let mut ledger = self.ledger.borrow_mut();
        ledger.depth += 1;
        Checkpoint(ledger.undo.len())
    }

    fn revert_to(&self, checkpoint: Checkpoint) {
        let mut ledger = self.ledger.borrow_mut();
        let undone = ledger.undo.len().saturating_sub(checkpoint.0);
        while ledger.undo.len() > checkpoint.0 {
            if let Some(undo) = ledger.undo.pop() {
                ledger.apply(undo);
            }
        }
        ledger.depth = ledger.depth.saturating_sub(1);
        debug!(undone, depth = ledger.depth, "Checkpoint reverted");
    }

    fn commit(&self, checkpoint: Checkpoint) {
        let mut ledger = self.ledger.borrow_mut();
        ledger.depth = ledger.depth.saturating_sub(1);
        // Inner commits keep their records so an enclosing revert still undoes them
        if ledger.depth == 0 {
            ledger.undo.clear();
        }
        debug!(at = checkpoint.0, depth = ledger.depth, "Checkpoint committed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::OrchestratorEvent;

    fn token() -> Address {
        Address::repeat_byte(0x01)
    }

    fn alice() -> Address {
        Address::repeat_byte(0x0a)
    }

    fn bob() -> Address {
        Address::repeat_byte(0x0b)
    }

    #[test]
    fn test_transfer_moves_balance() {
        let chain = Chain::new(0);
        chain.mint(token(), alice(), U256::from(10u64)).unwrap();

        chain
            .transfer(token(), alice(), bob(), U256::from(4u64))
            .unwrap();

        assert_eq!(chain.balance_of(token(), alice()), U256::from(6u64));
        assert_eq!(chain.balance_of(token(), bob()), U256::from(4u64));
    }

    #[test]
    fn test_transfer_rejects_overdraft() {
        let chain = Chain::new(0);
        chain.mint(token(), alice(), U256::from(1u64)).unwrap();

        let result = chain.transfer(token(), alice(), bob(), U256::from(2u64));

        assert_eq!(
            result,
            Err(OrchestratorError::InsufficientBalance {
                token: token(),
                account: alice(),
                needed: U256::from(2u64),
                available: U256::from(1u64),
            })
        );
        assert_eq!(chain.balance_of(token(), alice()), U256::from(1u64));
    }

    #[test]
    fn test_transfer_from_spends_allowance() {
        let chain = Chain::new(0);
        chain.mint(token(), alice(), U256::from(10u64)).unwrap();
        chain.approve(token(), alice(), bob(), U256::from(6u64));

        chain
            .transfer_from(token(), bob(), alice(), bob(), U256::from(4u64))
            .unwrap();
        assert_eq!(chain.allowance(token(), alice(), bob()), U256::from(2u64));

        let result = chain.transfer_from(token(), bob(), alice(), bob(), U256::from(3u64));
        assert!(matches!(
            result,
            Err(OrchestratorError::InsufficientAllowance { .. })
        ));
    }

    #[test]
    fn test_unlimited_allowance_is_not_consumed() {
        let chain = Chain::new(0);
        chain.mint(token(), alice(), U256::from(10u64)).unwrap();
        chain.approve(token(), alice(), bob(), U256::MAX);

        chain
            .transfer_from(token(), bob(), alice(), bob(), U256::from(4u64))
            .unwrap();

        assert_eq!(chain.allowance(token(), alice(), bob()), U256::MAX);
    }

    #[test]
    fn test_revert_restores_everything_in_reverse() {
        let chain = Chain::new(0);
        let slot = B256::repeat_byte(0x07);
        chain.mint(token(), alice(), U256::from(10u64)).unwrap();

        let checkpoint = chain.checkpoint();
        chain
            .transfer(token(), alice(), bob(), U256::from(3u64))
            .unwrap();
        chain
            .transfer(token(), alice(), bob(), U256::from(3u64))
            .unwrap();
        chain.approve(token(), alice(), bob(), U256::from(9u64));
        chain.store(bob(), slot, U256::from(1u64));
        JournalEntry::new(
            alice(),
            OrchestratorEvent::ThresholdUpdated {
                old: U256::ZERO,
                new: U256::from(1u64),
            },
        )
        .commit(&chain);
        chain.revert_to(checkpoint);

        assert_eq!(chain.balance_of(token(), alice()), U256::from(10u64));
        assert_eq!(chain.balance_of(token(), bob()), U256::ZERO);
        assert_eq!(chain.allowance(token(), alice(), bob()), U256::ZERO);
        assert_eq!(chain.load(bob(), slot), U256::ZERO);
        assert!(chain.events().is_empty());
        assert_eq!(chain.pending_undo(), 0);
    }

    #[test]
    fn test_outer_revert_undoes_inner_commit() {
        let chain = Chain::new(0);
        chain.mint(token(), alice(), U256::from(10u64)).unwrap();

        let outer = chain.checkpoint();
        let inner = chain.checkpoint();
        chain
            .transfer(token(), alice(), bob(), U256::from(5u64))
            .unwrap();
        chain.commit(inner);
        assert_eq!(chain.balance_of(token(), bob()), U256::from(5u64));
        chain.revert_to(outer);

        assert_eq!(chain.balance_of(token(), bob()), U256::ZERO);
        assert_eq!(chain.balance_of(token(), alice()), U256::from(10u64));
    }

    #[test]
    fn test_outermost_commit_clears_the_log() {
        let chain = Chain::new(0);
        let checkpoint = chain.checkpoint();
        chain.mint(token(), alice(), U256::from(1u64)).unwrap();
        assert_eq!(chain.pending_undo(), 1);

        chain.commit(checkpoint);

        assert_eq!(chain.pending_undo(), 0);
        assert_eq!(chain.balance_of(token(), alice()), U256::from(1u64));
    }

    #[test]
    fn test_default_chain_follows_wall_clock() {
        let before = chrono::Utc::now().timestamp() as u64;
        let chain = Chain::default();

        assert!(chain.timestamp() >= before);
        chain.set_timestamp(before + 12);
        assert_eq!(chain.timestamp(), before + 12);
    }

    #[test]
    fn test_contracts_are_tracked() {
        let chain = Chain::new(0);
        assert!(!chain.is_contract(alice()));

        chain.register_contract(alice());

        assert!(chain.is_contract(alice()));
        assert!(chain.executor_at(alice()).is_none());
    }
}

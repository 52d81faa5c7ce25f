use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use alloy_primitives::{Address, U256};
use tracing::debug;

use crate::{
    host::Host,
    orchestrator::Orchestrator,
    protocol::Executor,
    utils::error::{arithmetic_err, OrchestratorError, OrchestratorResult},
};

/// What the executor does with the funds it receives
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Behaviour {
    /// Hands back the dispatched amount plus the given profit
    ReturnWithProfit(U256),
    /// Hands back exactly the given amount
    ReturnFixed(U256),
    /// Hands back exactly the advertised required return
    ReturnRequired,
    /// Keeps the funds and reports failure
    Decline,
    /// Fails with the given reason
    Revert(String),
    /// Tries to start another run on the orchestrator as `caller`
    Reenter { caller: Address },
}

/// Executor whose behaviour is set per scenario.
/// Funds it hands back come from its own balance on the host.
pub struct ScriptedExecutor {
    address: Address,
    host: Rc<dyn Host>,
    behaviour: RefCell<Behaviour>,
    target: RefCell<Weak<Orchestrator>>,
    calls: Cell<u32>,
}

impl ScriptedExecutor {
    pub fn new(address: Address, host: Rc<dyn Host>, behaviour: Behaviour) -> Self {
        Self {
            address,
            host,
            behaviour: RefCell::new(behaviour),
            target: RefCell::new(Weak::new()),
            calls: Cell::new(0),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn set_behaviour(&self, behaviour: Behaviour) -> &Self {
        self.behaviour.replace(behaviour);
        self
    }

    /// Orchestrator targeted by [`Behaviour::Reenter`]
    pub fn set_target(&self, target: &Rc<Orchestrator>) -> &Self {
        self.target.replace(Rc::downgrade(target));
        self
    }

    /// Number of times the executor has been invoked
    pub fn calls(&self) -> u32 {
        self.calls.get()
    }

    fn hand_back(&self, caller: Address, asset: Address, amount: U256) -> OrchestratorResult<bool> {
        self.host.transfer(asset, self.address, caller, amount)?;
        Ok(true)
    }
}

impl Executor for ScriptedExecutor {
    fn execute(
        &self,
        caller: Address,
        asset: Address,
        amount: U256,
        required_return: U256,
    ) -> OrchestratorResult<bool> {
        self.calls.set(self.calls.get() + 1);
        let behaviour = self.behaviour.borrow().clone();
        debug!(?behaviour, %amount, %required_return, "Executor invoked");

        match behaviour {
            Behaviour::ReturnWithProfit(profit) => {
                let total = amount
                    .checked_add(profit)
                    .ok_or(arithmetic_err("Executor return overflowed."))?;
                self.hand_back(caller, asset, total)
            }
            Behaviour::ReturnFixed(total) => self.hand_back(caller, asset, total),
            Behaviour::ReturnRequired => self.hand_back(caller, asset, required_return),
            Behaviour::Decline => Ok(false),
            Behaviour::Revert(reason) => Err(OrchestratorError::Custom(reason)),
            Behaviour::Reenter { caller: as_caller } => {
                let target = self.target.borrow().upgrade().ok_or_else(|| {
                    OrchestratorError::Custom("No orchestrator to re-enter.".to_string())
                })?;
                target.initiate(as_caller, U256::from(1u64), U256::from(1u64), self.address)?;
                self.hand_back(caller, asset, amount)
            }
        }
    }
}

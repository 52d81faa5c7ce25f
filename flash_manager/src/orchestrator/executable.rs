//! The orchestrator that drives one leveraged flash run.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use alloy_primitives::{Address, U256};
use tracing::{debug, info, warn};

use crate::{
    accounting::{self, verify_return, BalanceSnapshot},
    constants::{repay_all, REFERRAL_CODE},
    host::{atomically, Host},
    journal::{JournalEntry, OrchestratorEvent},
    protocol::{FlashLoanReceiver, LendingPool},
    types::*,
    utils::{common::only_owner, error::*},
    validation::validate_run,
};

use super::{
    data::OrchestratorData,
    lock::{Lock, RunGuard},
    settings::{Configuration, Settings},
    stage::RunStage,
};

pub struct Orchestrator {
    /// The orchestrator's own address on the host
    pub(super) address: Address,
    /// Immutable settings and configurations
    pub(super) config: Configuration,
    /// Mutable state
    pub(super) data: RefCell<OrchestratorData>,
    /// Determines if a run is currently in flight.
    pub(super) lock: RefCell<Lock>,
    /// Last stage reached by the current or previous run
    pub(super) stage: Cell<RunStage>,
    /// Figures recorded by the resumption handler for `initiate` to hand back
    pub(super) outcome: RefCell<Option<RunReport>>,
    pub(super) host: Rc<dyn Host>,
    pub(super) pool: Rc<dyn LendingPool>,
}

impl Orchestrator {
    pub fn new(
        address: Address,
        config: Configuration,
        host: Rc<dyn Host>,
        pool: Rc<dyn LendingPool>,
    ) -> OrchestratorResult<Self> {
        if address.is_zero() {
            return Err(OrchestratorError::InvalidAddress("orchestrator"));
        }
        if pool.address() != config.protocol() {
            return Err(OrchestratorError::InvalidAddress("protocolAddress"));
        }

        Ok(Self {
            address,
            config,
            data: RefCell::new(OrchestratorData::default()),
            lock: RefCell::new(Lock::default()),
            stage: Cell::new(RunStage::Idle),
            outcome: RefCell::new(None),
            host,
            pool,
        })
    }

    /// Builds the orchestrator from loaded settings, seeding the profit threshold.
    pub fn from_settings(
        address: Address,
        settings: &Settings,
        host: Rc<dyn Host>,
        pool: Rc<dyn LendingPool>,
    ) -> OrchestratorResult<Self> {
        let orchestrator = Self::new(address, settings.build()?, host, pool)?;
        orchestrator
            .data
            .borrow_mut()
            .replace_profit_threshold(settings.profit_threshold);
        Ok(orchestrator)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn profit_threshold(&self) -> U256 {
        self.data.borrow().profit_threshold
    }

    pub fn stage(&self) -> RunStage {
        self.stage.get()
    }

    pub fn is_running(&self) -> bool {
        self.lock.borrow().is_locked
    }

    /// Host timestamp at which the latest run was started
    pub fn last_run_at(&self) -> Option<u64> {
        self.lock.borrow().last_locked_at
    }

    /// Starts a run. Owner only.
    ///
    /// Flash-borrows `collateral_amount` of the collateral asset; the rest of the
    /// sequence happens inside [`FlashLoanReceiver::on_loan_received`]. Any failure
    /// discards every effect performed since entry.
    pub fn initiate(
        &self,
        caller: Address,
        collateral_amount: U256,
        borrow_amount: U256,
        executor: Address,
    ) -> OrchestratorResult<RunReport> {
        only_owner(self.config.owner(), caller)?;
        let guard = RunGuard::acquire(&self.lock, &self.stage, self.host.timestamp())?;

        let params = RunParameters::new(collateral_amount, borrow_amount, executor);
        validate_run(&params, self.host.as_ref())?;

        guard.begin();
        self.outcome.replace(None);

        let result = atomically(self.host.as_ref(), || {
            self.request_loan(&params)?;
            self.outcome.take().ok_or(OrchestratorError::Protocol(
                "The lending protocol never resumed the run.".to_string(),
            ))
        });

        match &result {
            Ok(report) => info!(
                final_balance = %report.final_balance,
                returned = %report.returned_amount,
                premium = %report.premium,
                "Run completed"
            ),
            Err(err) => {
                warn!(stage = ?self.stage.get(), error = %err, "Run reverted");
                self.stage.set(RunStage::Reverted);
            }
        }

        result
    }

    /// Lending protocol's view of this orchestrator's position
    pub fn account_health(&self) -> OrchestratorResult<AccountHealth> {
        self.pool.query_account(self.address)
    }

    pub fn account_health_query(&self) -> OrchestratorResult<AccountHealthQuery> {
        self.account_health().map(AccountHealthQuery::from)
    }

    pub fn health_factor(&self) -> OrchestratorResult<U256> {
        Ok(self.account_health()?.health_factor)
    }

    /// Collateral needed to borrow `borrow_amount` at `ltv_bps`
    pub fn required_collateral(&self, borrow_amount: U256, ltv_bps: U256) -> OrchestratorResult<U256> {
        accounting::required_collateral(borrow_amount, ltv_bps)
    }

    /// Fee charged for flash-borrowing `amount`
    pub fn flash_fee(&self, amount: U256) -> OrchestratorResult<U256> {
        accounting::flash_fee(amount)
    }

    fn advance(&self, to: RunStage) -> OrchestratorResult<()> {
        let from = self.stage.get();
        if !from.can_transition_to(to) {
            return Err(OrchestratorError::InvalidStage { from, to });
        }
        debug!(?from, ?to, "Stage transition");
        self.stage.set(to);
        Ok(())
    }

    pub(super) fn emit(&self, event: OrchestratorEvent) {
        JournalEntry::new(self.address, event).commit(self.host.as_ref());
    }

    fn request_loan(&self, params: &RunParameters) -> OrchestratorResult<()> {
        self.advance(RunStage::LoanRequested)?;
        self.emit(OrchestratorEvent::RunInitiated {
            collateral_amount: params.collateral_amount,
            borrow_amount: params.borrow_amount,
            executor: params.executor,
            timestamp: self.host.timestamp(),
        });

        self.pool.flash_borrow(
            self.address,
            self,
            self.config.collateral_asset(),
            params.collateral_amount,
            &params.encode_payload(),
            REFERRAL_CODE,
        )
    }

    /// Rejects resumption by anyone but the configured protocol, for a run this
    /// orchestrator did not start, or for the wrong asset.
    fn authenticate(&self, context: &CallbackContext) -> OrchestratorResult<()> {
        if context.caller != self.config.protocol() {
            warn!(caller = %context.caller, "Callback from unexpected caller");
            return Err(OrchestratorError::UnauthorizedCallback(context.caller));
        }
        if context.initiator != self.address {
            warn!(initiator = %context.initiator, "Callback for a foreign run");
            return Err(OrchestratorError::UnauthorizedCallback(context.initiator));
        }
        if context.asset != self.config.collateral_asset() {
            warn!(asset = %context.asset, "Callback for unexpected asset");
            return Err(OrchestratorError::UnauthorizedCallback(context.caller));
        }
        Ok(())
    }

    fn deposit_collateral(&self, context: &CallbackContext) -> OrchestratorResult<()> {
        self.advance(RunStage::CollateralDeposited)?;

        self.host.approve(
            context.asset,
            self.address,
            self.pool.address(),
            context.amount,
        );
        self.pool.supply(
            self.address,
            context.asset,
            context.amount,
            self.address,
            REFERRAL_CODE,
        )?;
        self.pool
            .set_collateral_flag(self.address, context.asset, true)?;

        self.emit(OrchestratorEvent::CollateralDeposited {
            asset: context.asset,
            amount: context.amount,
        });
        Ok(())
    }

    fn borrow(&self, params: &RunParameters) -> OrchestratorResult<()> {
        self.advance(RunStage::Borrowed)?;

        // The protocol rejects an under-collateralised borrow on its own
        self.pool.borrow(
            self.address,
            self.config.borrow_asset(),
            params.borrow_amount,
            InterestRateMode::Variable,
            REFERRAL_CODE,
            self.address,
        )?;

        self.emit(OrchestratorEvent::BorrowExecuted {
            asset: self.config.borrow_asset(),
            amount: params.borrow_amount,
        });
        Ok(())
    }

    fn dispatch(&self, params: &RunParameters) -> OrchestratorResult<BalanceSnapshot> {
        self.advance(RunStage::Dispatched)?;

        let asset = self.config.borrow_asset();
        let snapshot = BalanceSnapshot::new(self.host.balance_of(asset, self.address));
        self.host
            .transfer(asset, self.address, params.executor, params.borrow_amount)?;
        debug!(executor = %params.executor, amount = %params.borrow_amount, "Funds dispatched");

        Ok(snapshot)
    }

    fn verify(
        &self,
        params: &RunParameters,
        snapshot: &mut BalanceSnapshot,
    ) -> OrchestratorResult<U256> {
        let asset = self.config.borrow_asset();
        let required_return = accounting::required_return(params.borrow_amount)?;

        let executor = self.host.executor_at(params.executor).ok_or_else(|| {
            OrchestratorError::ExecutorFailed(
                params.executor,
                "No executor interface at the target.".to_string(),
            )
        })?;
        let succeeded = executor
            .execute(self.address, asset, params.borrow_amount, required_return)
            .map_err(|err| OrchestratorError::ExecutorFailed(params.executor, err.to_string()))?;
        if !succeeded {
            return Err(OrchestratorError::ExecutorFailed(
                params.executor,
                "Executor reported failure.".to_string(),
            ));
        }

        snapshot.after(self.host.balance_of(asset, self.address));
        let returned_amount = verify_return(snapshot, params.borrow_amount)?;

        self.advance(RunStage::Verified)?;

        let mut entry = JournalEntry::new(
            self.address,
            OrchestratorEvent::ArbitrageExecuted {
                executor: params.executor,
                borrow_amount: params.borrow_amount,
                returned_amount,
            },
        );
        // Advisory only
        let profit = returned_amount.saturating_sub(params.borrow_amount);
        let threshold = self.profit_threshold();
        if profit < threshold {
            warn!(%profit, %threshold, "Profit below threshold");
            entry.note(format!("profit {} below threshold {}", profit, threshold));
        }
        entry.commit(self.host.as_ref());
        Ok(returned_amount)
    }

    fn repay(&self) -> OrchestratorResult<U256> {
        self.advance(RunStage::Repaid)?;

        let asset = self.config.borrow_asset();
        let pool = self.pool.address();
        self.host.approve(
            asset,
            self.address,
            pool,
            self.host.balance_of(asset, self.address),
        );
        // Repay everything outstanding so interest accrued mid-run is covered too
        let repaid = self.pool.repay(
            self.address,
            asset,
            repay_all(),
            InterestRateMode::Variable,
            self.address,
        )?;
        self.host.approve(asset, self.address, pool, U256::ZERO);

        debug!(%repaid, "Debt repaid");
        Ok(repaid)
    }

    fn unwind(&self, collateral_amount: U256) -> OrchestratorResult<U256> {
        self.advance(RunStage::Unwound)?;

        let withdrawn = self.pool.withdraw(
            self.address,
            self.config.collateral_asset(),
            collateral_amount,
            self.address,
        )?;

        debug!(%withdrawn, "Collateral withdrawn");
        Ok(withdrawn)
    }

    /// Leaves an allowance for the protocol to pull `amount + premium`.
    /// Returns the borrow-asset balance left over.
    fn settle(&self, context: &CallbackContext) -> OrchestratorResult<U256> {
        self.advance(RunStage::Completed)?;

        let owed = context
            .amount
            .checked_add(context.premium)
            .ok_or(arithmetic_err("Flash repayment overflowed."))?;
        self.host
            .approve(context.asset, self.address, self.pool.address(), owed);

        let final_balance = self
            .host
            .balance_of(self.config.borrow_asset(), self.address);
        self.emit(OrchestratorEvent::StrategyCompleted {
            final_balance,
            timestamp: self.host.timestamp(),
        });
        Ok(final_balance)
    }
}

impl FlashLoanReceiver for Orchestrator {
    fn address(&self) -> Address {
        self.address
    }

    fn on_loan_received(
        &self,
        caller: Address,
        asset: Address,
        amount: U256,
        premium: U256,
        initiator: Address,
        params: &[u8],
    ) -> OrchestratorResult<bool> {
        let context = CallbackContext {
            caller,
            asset,
            amount,
            premium,
            initiator,
            params: params.to_vec(),
        };
        self.authenticate(&context)?;
        debug!(params = %hex::encode(&context.params), %amount, %premium, "Run resumed");

        let run = RunParameters::decode_payload(context.amount, &context.params)?;

        self.deposit_collateral(&context)?;
        self.borrow(&run)?;
        let mut snapshot = self.dispatch(&run)?;
        let returned_amount = self.verify(&run, &mut snapshot)?;
        self.repay()?;
        self.unwind(context.amount)?;
        let final_balance = self.settle(&context)?;

        self.outcome.replace(Some(RunReport {
            collateral_amount: context.amount,
            borrow_amount: run.borrow_amount,
            premium: context.premium,
            returned_amount,
            final_balance,
        }));
        Ok(true)
    }
}

use std::rc::Rc;

use alloy_primitives::{Address, U256};

use crate::{
    chain::Chain,
    host::Host,
    orchestrator::{settings::Settings, Orchestrator},
    types::RunReport,
    utils::error::OrchestratorResult,
};

use super::{
    executor::{Behaviour, ScriptedExecutor},
    pool::{Reserve, SimLendingPool},
};

/// Block timestamp every deployment starts at
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

/// `amount * 10^decimals`
pub fn units(amount: u64, decimals: u8) -> U256 {
    U256::from(amount) * U256::from(10u64).pow(U256::from(decimals))
}

pub fn orchestrator_address() -> Address {
    Address::repeat_byte(0x0c)
}

pub fn executor_address() -> Address {
    Address::repeat_byte(0x0e)
}

/// Settings of the default market: WETH-like collateral, USDC-like borrow asset
pub fn default_settings() -> Settings {
    let mut settings = Settings::default();
    settings
        .protocol(Address::repeat_byte(0x11))
        .collateral_asset(Address::repeat_byte(0x22))
        .borrow_asset(Address::repeat_byte(0x33))
        .owner(Address::repeat_byte(0x44))
        .log_level("info");
    settings
}

/// A chain with a two-asset lending market, a funded scripted executor and an orchestrator.
///
/// - collateral asset: 18 decimals, price 3000, LTV 80%, liquidation threshold 82.5%
/// - borrow asset: 6 decimals, price 1, LTV 77%, liquidation threshold 80%
/// - pool liquidity: 1000 collateral and 1,000,000 borrow asset
/// - orchestrator holds 0.01 collateral to pay the flash fee
/// - executor holds 20,000 borrow asset and hands back the borrow plus 100
pub struct Deployment {
    pub chain: Rc<Chain>,
    pub pool: Rc<SimLendingPool>,
    pub executor: Rc<ScriptedExecutor>,
    pub orchestrator: Rc<Orchestrator>,
    pub settings: Settings,
}

impl Deployment {
    pub fn new() -> OrchestratorResult<Self> {
        Self::deploy(&default_settings(), U256::ZERO)
    }

    /// Same market, with `interest_bps` of debt charged on every borrow.
    pub fn with_borrow_interest(interest_bps: U256) -> OrchestratorResult<Self> {
        Self::deploy(&default_settings(), interest_bps)
    }

    pub fn deploy(settings: &Settings, interest_bps: U256) -> OrchestratorResult<Self> {
        Self::deploy_on(Chain::new(GENESIS_TIMESTAMP), settings, interest_bps)
    }

    /// Deploys the market onto an existing `chain`.
    pub fn deploy_on(
        chain: Chain,
        settings: &Settings,
        interest_bps: U256,
    ) -> OrchestratorResult<Self> {
        let chain = Rc::new(chain);
        let host: Rc<dyn Host> = chain.clone();

        let mut pool = SimLendingPool::new(settings.protocol, host.clone());
        pool.add_reserve(
            settings.collateral_asset,
            Reserve {
                decimals: 18,
                price: units(3_000, 8),
                ltv_bps: U256::from(8_000u64),
                liquidation_threshold_bps: U256::from(8_250u64),
                receipt_token: Address::repeat_byte(0xa2),
                debt_token: Address::repeat_byte(0xd2),
                accrued_interest_bps: interest_bps,
            },
        )
        .add_reserve(
            settings.borrow_asset,
            Reserve {
                decimals: 6,
                price: units(1, 8),
                ltv_bps: U256::from(7_700u64),
                liquidation_threshold_bps: U256::from(8_000u64),
                receipt_token: Address::repeat_byte(0xa3),
                debt_token: Address::repeat_byte(0xd3),
                accrued_interest_bps: interest_bps,
            },
        );
        let pool = Rc::new(pool);
        chain.register_contract(settings.protocol);
        chain.mint(settings.collateral_asset, settings.protocol, units(1_000, 18))?;
        chain.mint(settings.borrow_asset, settings.protocol, units(1_000_000, 6))?;

        let orchestrator = Rc::new(Orchestrator::from_settings(
            orchestrator_address(),
            settings,
            host.clone(),
            pool.clone(),
        )?);
        chain.register_contract(orchestrator_address());
        chain.mint(settings.collateral_asset, orchestrator_address(), units(1, 16))?;

        let executor = Rc::new(ScriptedExecutor::new(
            executor_address(),
            host,
            Behaviour::ReturnWithProfit(units(100, 6)),
        ));
        executor.set_target(&orchestrator);
        chain.deploy_executor(executor_address(), executor.clone());
        chain.mint(settings.borrow_asset, executor_address(), units(20_000, 6))?;

        Ok(Self {
            chain,
            pool,
            executor,
            orchestrator,
            settings: settings.clone(),
        })
    }

    pub fn owner(&self) -> Address {
        self.settings.owner
    }

    pub fn collateral_asset(&self) -> Address {
        self.settings.collateral_asset
    }

    pub fn borrow_asset(&self) -> Address {
        self.settings.borrow_asset
    }

    pub fn pool_address(&self) -> Address {
        self.settings.protocol
    }

    pub fn balance(&self, token: Address, account: Address) -> U256 {
        self.chain.balance_of(token, account)
    }

    /// Starts a run as the owner against the scripted executor.
    pub fn run(&self, collateral_amount: U256, borrow_amount: U256) -> OrchestratorResult<RunReport> {
        self.orchestrator.initiate(
            self.owner(),
            collateral_amount,
            borrow_amount,
            executor_address(),
        )
    }
}

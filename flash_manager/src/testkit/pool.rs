use std::{collections::HashMap, rc::Rc};

use alloy_primitives::{keccak256, Address, B256, U256};
use tracing::debug;

use crate::{
    accounting::flash_fee,
    constants::{bps_denominator, health_factor_scale},
    host::Host,
    protocol::{FlashLoanReceiver, LendingPool},
    types::{AccountHealth, InterestRateMode},
    utils::{
        common::mul_div,
        error::{arithmetic_err, OrchestratorError, OrchestratorResult},
    },
};

/// Market parameters of one asset
#[derive(Clone, Debug)]
pub struct Reserve {
    pub decimals: u8,
    /// Price of one whole unit in base currency (8 decimals)
    pub price: U256,
    pub ltv_bps: U256,
    pub liquidation_threshold_bps: U256,
    /// Minted 1:1 on supply
    pub receipt_token: Address,
    /// Minted on borrow
    pub debt_token: Address,
    /// Interest charged up front on every borrow, in basis points
    pub accrued_interest_bps: U256,
}

/// Aggregated position of one account, in base currency
#[derive(Clone, Copy, Debug, Default)]
struct Position {
    collateral: U256,
    debt: U256,
    borrow_capacity: U256,
    liquidation_capacity: U256,
}

pub struct SimLendingPool {
    address: Address,
    host: Rc<dyn Host>,
    reserves: HashMap<Address, Reserve>,
}

fn protocol_err<S: AsRef<str>>(s: S) -> OrchestratorError {
    OrchestratorError::Protocol(s.as_ref().to_string())
}

impl SimLendingPool {
    pub fn new(address: Address, host: Rc<dyn Host>) -> Self {
        Self {
            address,
            host,
            reserves: HashMap::new(),
        }
    }

    /// Lists `asset` on the pool
    pub fn add_reserve(&mut self, asset: Address, reserve: Reserve) -> &mut Self {
        self.reserves.insert(asset, reserve);
        self
    }

    pub fn reserve(&self, asset: Address) -> OrchestratorResult<&Reserve> {
        self.reserves
            .get(&asset)
            .ok_or_else(|| protocol_err(format!("Asset {} is not listed.", asset)))
    }

    /// Supplied balance of `who` in `asset`
    pub fn supplied(&self, asset: Address, who: Address) -> OrchestratorResult<U256> {
        Ok(self
            .host
            .balance_of(self.reserve(asset)?.receipt_token, who))
    }

    /// Outstanding debt of `who` in `asset`
    pub fn debt(&self, asset: Address, who: Address) -> OrchestratorResult<U256> {
        Ok(self.host.balance_of(self.reserve(asset)?.debt_token, who))
    }

    pub fn is_collateral_enabled(&self, asset: Address, who: Address) -> bool {
        self.host.load(self.address, collateral_slot(who, asset)) != U256::ZERO
    }

    fn value(reserve: &Reserve, amount: U256) -> OrchestratorResult<U256> {
        let unit = U256::from(10u64).pow(U256::from(reserve.decimals));
        mul_div(amount, reserve.price, unit)
    }

    /// Position of `who`, optionally pretending `withdrawn` collateral is already gone
    fn position(
        &self,
        who: Address,
        withdrawn: Option<(Address, U256)>,
    ) -> OrchestratorResult<Position> {
        let mut position = Position::default();

        for (asset, reserve) in &self.reserves {
            let debt = self.host.balance_of(reserve.debt_token, who);
            position.debt = position
                .debt
                .checked_add(Self::value(reserve, debt)?)
                .ok_or(arithmetic_err("Debt value overflowed."))?;

            if !self.is_collateral_enabled(*asset, who) {
                continue;
            }
            let mut supplied = self.host.balance_of(reserve.receipt_token, who);
            if let Some((withdrawn_asset, amount)) = withdrawn {
                if withdrawn_asset == *asset {
                    supplied = supplied.saturating_sub(amount);
                }
            }
            let value = Self::value(reserve, supplied)?;
            position.collateral = position
                .collateral
                .checked_add(value)
                .ok_or(arithmetic_err("Collateral value overflowed."))?;
            position.borrow_capacity += mul_div(value, reserve.ltv_bps, bps_denominator())?;
            position.liquidation_capacity +=
                mul_div(value, reserve.liquidation_threshold_bps, bps_denominator())?;
        }

        Ok(position)
    }
}

/// Storage slot of the collateral flag for (`who`, `asset`)
fn collateral_slot(who: Address, asset: Address) -> B256 {
    keccak256([who.as_slice(), asset.as_slice()].concat())
}

impl LendingPool for SimLendingPool {
    fn address(&self) -> Address {
        self.address
    }

    fn flash_borrow(
        &self,
        caller: Address,
        receiver: &dyn FlashLoanReceiver,
        asset: Address,
        amount: U256,
        params: &[u8],
        _referral: u16,
    ) -> OrchestratorResult<()> {
        self.reserve(asset)?;
        let premium = flash_fee(amount)?;
        let receiver_address = receiver.address();

        self.host
            .transfer(asset, self.address, receiver_address, amount)?;
        let accepted =
            receiver.on_loan_received(self.address, asset, amount, premium, caller, params)?;
        if !accepted {
            return Err(protocol_err("Flash borrow receiver declined."));
        }

        let owed = amount
            .checked_add(premium)
            .ok_or(arithmetic_err("Flash repayment overflowed."))?;
        self.host
            .transfer_from(asset, self.address, receiver_address, self.address, owed)?;
        debug!(%asset, %amount, %premium, "Flash borrow settled");
        Ok(())
    }

    fn supply(
        &self,
        caller: Address,
        asset: Address,
        amount: U256,
        on_behalf_of: Address,
        _referral: u16,
    ) -> OrchestratorResult<()> {
        let reserve = self.reserve(asset)?;
        if amount == U256::ZERO {
            return Err(protocol_err("Cannot supply zero."));
        }
        self.host
            .transfer_from(asset, self.address, caller, self.address, amount)?;
        self.host.mint(reserve.receipt_token, on_behalf_of, amount)
    }

    fn set_collateral_flag(
        &self,
        caller: Address,
        asset: Address,
        enabled: bool,
    ) -> OrchestratorResult<()> {
        let reserve = self.reserve(asset)?;
        if enabled && self.host.balance_of(reserve.receipt_token, caller) == U256::ZERO {
            return Err(protocol_err("No supplied balance to use as collateral."));
        }

        let slot = collateral_slot(caller, asset);
        let previous = self.host.load(self.address, slot);
        self.host
            .store(self.address, slot, U256::from(u8::from(enabled)));

        if !enabled {
            let position = self.position(caller, None)?;
            if position.debt > position.liquidation_capacity {
                self.host.store(self.address, slot, previous);
                return Err(protocol_err("Collateral is backing an open borrow."));
            }
        }
        Ok(())
    }

    fn borrow(
        &self,
        caller: Address,
        asset: Address,
        amount: U256,
        rate_mode: InterestRateMode,
        _referral: u16,
        on_behalf_of: Address,
    ) -> OrchestratorResult<()> {
        let reserve = self.reserve(asset)?;
        if on_behalf_of != caller {
            return Err(protocol_err("Credit delegation is not supported."));
        }
        if rate_mode != InterestRateMode::Variable {
            return Err(protocol_err("Stable rate borrowing is disabled."));
        }

        let interest = mul_div(amount, reserve.accrued_interest_bps, bps_denominator())?;
        let debt = amount
            .checked_add(interest)
            .ok_or(arithmetic_err("Debt overflowed."))?;

        let position = self.position(caller, None)?;
        let debt_after = position
            .debt
            .checked_add(Self::value(reserve, debt)?)
            .ok_or(arithmetic_err("Debt value overflowed."))?;
        if debt_after > position.borrow_capacity {
            return Err(protocol_err(format!(
                "Borrow exceeds collateral capacity: {} > {}.",
                debt_after, position.borrow_capacity
            )));
        }

        self.host.mint(reserve.debt_token, on_behalf_of, debt)?;
        self.host.transfer(asset, self.address, caller, amount)
    }

    fn repay(
        &self,
        caller: Address,
        asset: Address,
        amount: U256,
        _rate_mode: InterestRateMode,
        on_behalf_of: Address,
    ) -> OrchestratorResult<U256> {
        let reserve = self.reserve(asset)?;
        let debt = self.host.balance_of(reserve.debt_token, on_behalf_of);
        if debt == U256::ZERO {
            return Err(protocol_err("No debt to repay."));
        }

        let payment = if amount == U256::MAX {
            debt
        } else {
            amount.min(debt)
        };
        self.host
            .transfer_from(asset, self.address, caller, self.address, payment)?;
        self.host.burn(reserve.debt_token, on_behalf_of, payment)?;
        Ok(payment)
    }

    fn withdraw(
        &self,
        caller: Address,
        asset: Address,
        amount: U256,
        to: Address,
    ) -> OrchestratorResult<U256> {
        let reserve = self.reserve(asset)?;
        let supplied = self.host.balance_of(reserve.receipt_token, caller);
        let amount = if amount == U256::MAX { supplied } else { amount };
        if amount > supplied {
            return Err(protocol_err("Withdrawal exceeds supplied balance."));
        }

        let position = self.position(caller, Some((asset, amount)))?;
        if position.debt > position.liquidation_capacity {
            return Err(protocol_err("Withdrawal would leave the position liquidatable."));
        }

        self.host.burn(reserve.receipt_token, caller, amount)?;
        self.host.transfer(asset, self.address, to, amount)?;
        Ok(amount)
    }

    fn query_account(&self, who: Address) -> OrchestratorResult<AccountHealth> {
        let position = self.position(who, None)?;

        let (ltv, liquidation_threshold) = if position.collateral == U256::ZERO {
            (U256::ZERO, U256::ZERO)
        } else {
            (
                mul_div(position.borrow_capacity, bps_denominator(), position.collateral)?,
                mul_div(
                    position.liquidation_capacity,
                    bps_denominator(),
                    position.collateral,
                )?,
            )
        };
        let health_factor = if position.debt == U256::ZERO {
            U256::MAX
        } else {
            mul_div(
                position.liquidation_capacity,
                health_factor_scale(),
                position.debt,
            )?
        };

        Ok(AccountHealth {
            total_collateral: position.collateral,
            total_debt: position.debt,
            available_borrows: position.borrow_capacity.saturating_sub(position.debt),
            liquidation_threshold,
            ltv,
            health_factor,
        })
    }
}

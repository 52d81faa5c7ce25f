use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolType};
use candid::{CandidType, Nat};
use serde::{Deserialize, Serialize};

use crate::utils::{
    common::u256_to_nat,
    error::{OrchestratorError, OrchestratorResult},
};

sol!(
    // Resumption data carried through the flash borrow
    struct RunPayload {
        uint256 borrowAmount;
        address executor;
    }
);

/// Per-invocation parameters of a run. Never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunParameters {
    pub collateral_amount: U256,
    pub borrow_amount: U256,
    pub executor: Address,
}

impl RunParameters {
    pub fn new(collateral_amount: U256, borrow_amount: U256, executor: Address) -> Self {
        Self {
            collateral_amount,
            borrow_amount,
            executor,
        }
    }

    /// ABI-encodes the part of the parameters the lending protocol hands back on resumption.
    pub fn encode_payload(&self) -> Vec<u8> {
        <RunPayload as SolType>::abi_encode(&RunPayload {
            borrowAmount: self.borrow_amount,
            executor: self.executor,
        })
    }

    /// Rebuilds the parameters from the amount actually received and the opaque payload.
    pub fn decode_payload(collateral_amount: U256, data: &[u8]) -> OrchestratorResult<Self> {
        let payload = <RunPayload as SolType>::abi_decode(data, true)
            .map_err(|err| OrchestratorError::DecodingError(err.to_string()))?;
        Ok(Self::new(collateral_amount, payload.borrowAmount, payload.executor))
    }
}

/// Data delivered by the lending protocol when it resumes a run.
/// Not trusted until authenticated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CallbackContext {
    /// Immediate caller of the resumption handler
    pub caller: Address,
    pub asset: Address,
    pub amount: U256,
    pub premium: U256,
    /// Principal that requested the flash borrow
    pub initiator: Address,
    #[serde(with = "serde_bytes")]
    pub params: Vec<u8>,
}

/// Interest rate mode of a borrow position
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterestRateMode {
    Stable = 1,
    Variable = 2,
}

/// Account position as reported by the lending protocol.
/// Values are denominated in the protocol's base currency, ratios in basis points,
/// and the health factor is scaled by 1e18.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AccountHealth {
    pub total_collateral: U256,
    pub total_debt: U256,
    pub available_borrows: U256,
    pub liquidation_threshold: U256,
    pub ltv: U256,
    pub health_factor: U256,
}

/// Candid-friendly rendering of [`AccountHealth`] for external observers
#[derive(Clone, Debug, CandidType, Deserialize, PartialEq)]
pub struct AccountHealthQuery {
    pub total_collateral: Nat,
    pub total_debt: Nat,
    pub available_borrows: Nat,
    pub liquidation_threshold: Nat,
    pub ltv: Nat,
    pub health_factor: Nat,
}

impl From<AccountHealth> for AccountHealthQuery {
    fn from(value: AccountHealth) -> Self {
        Self {
            total_collateral: u256_to_nat(&value.total_collateral),
            total_debt: u256_to_nat(&value.total_debt),
            available_borrows: u256_to_nat(&value.available_borrows),
            liquidation_threshold: u256_to_nat(&value.liquidation_threshold),
            ltv: u256_to_nat(&value.ltv),
            health_factor: u256_to_nat(&value.health_factor),
        }
    }
}

/// Figures of a completed run, matching what the emitted events report
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub collateral_amount: U256,
    pub borrow_amount: U256,
    /// Flash fee paid in the collateral asset
    pub premium: U256,
    /// Amount the executor handed back
    pub returned_amount: U256,
    /// Borrow-asset balance held after the unwind
    pub final_balance: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_survives_the_flash_borrow() {
        let params = RunParameters::new(
            U256::from(10u64),
            U256::from(15_000u64),
            Address::repeat_byte(0x42),
        );

        let decoded =
            RunParameters::decode_payload(params.collateral_amount, &params.encode_payload())
                .unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn test_garbage_payload_is_a_decoding_error() {
        let result = RunParameters::decode_payload(U256::from(1u64), &[0xde, 0xad]);
        assert!(matches!(result, Err(OrchestratorError::DecodingError(_))));
    }

    #[test]
    fn test_health_query_renders_nat() {
        let health = AccountHealth {
            total_collateral: U256::from(30_000u64),
            health_factor: U256::MAX,
            ..Default::default()
        };
        let query: AccountHealthQuery = health.into();
        assert_eq!(query.total_collateral, Nat::from(30_000u64));
        assert_eq!(query.total_debt, Nat::from(0u64));
        assert_eq!(query.health_factor, u256_to_nat(&U256::MAX));
    }
}

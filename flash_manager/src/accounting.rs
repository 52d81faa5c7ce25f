//! Accounting Guard
//!
//! Stateless fee/threshold arithmetic and the balance-delta check performed after
//! the executor hands funds back. All math is exact integer math on `U256`, so
//! `amount * 10_000` cannot overflow for any realistic token amount.

use alloy_primitives::U256;

use crate::{
    constants::{bps_denominator, flash_fee_bps, return_buffer_bps},
    utils::{
        common::{mul_div, mul_div_ceil},
        error::{arithmetic_err, OrchestratorError, OrchestratorResult},
    },
};

/// Flash fee for borrowing `amount`: `amount * 5 / 10_000`, truncated.
pub fn flash_fee(amount: U256) -> OrchestratorResult<U256> {
    mul_div(amount, flash_fee_bps(), bps_denominator())
}

/// Collateral needed to borrow `borrow_amount` at a loan-to-value of `ltv_bps`.
/// Defined as zero when `ltv_bps` is zero.
pub fn required_collateral(borrow_amount: U256, ltv_bps: U256) -> OrchestratorResult<U256> {
    if ltv_bps == U256::ZERO {
        return Ok(U256::ZERO);
    }
    mul_div(borrow_amount, bps_denominator(), ltv_bps)
}

/// Amount the executor is asked to return: `borrow_amount` plus a 2% buffer rounded up.
pub fn required_return(borrow_amount: U256) -> OrchestratorResult<U256> {
    let buffer = mul_div_ceil(borrow_amount, return_buffer_bps(), bps_denominator())?;
    borrow_amount
        .checked_add(buffer)
        .ok_or(arithmetic_err("Required return overflowed."))
}

/// Borrow-asset balance readings taken around the executor call.
/// `before` is read while the dispatched amount is still held.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub before: U256,
    pub after: U256,
}

impl BalanceSnapshot {
    pub fn new(before: U256) -> Self {
        Self {
            before,
            after: U256::ZERO,
        }
    }

    pub fn after(&mut self, after: U256) -> &mut Self {
        self.after = after;
        self
    }

    /// Amount handed back by the executor: `after - before + dispatched`
    pub fn returned_amount(&self, dispatched: U256) -> OrchestratorResult<U256> {
        self.after
            .checked_add(dispatched)
            .ok_or(arithmetic_err("Returned amount overflowed."))?
            .checked_sub(self.before)
            .ok_or(arithmetic_err("Balance dropped by more than the dispatched amount."))
    }
}

/// Checks that enough came back to cover the borrow, returning the amount the executor handed back.
pub fn verify_return(snapshot: &BalanceSnapshot, borrow_amount: U256) -> OrchestratorResult<U256> {
    if snapshot.after < borrow_amount {
        return Err(OrchestratorError::InsufficientReturn {
            expected: borrow_amount,
            actual: snapshot.after,
        });
    }
    snapshot.returned_amount(borrow_amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use proptest::prelude::*;

    fn to_big(value: U256) -> BigUint {
        BigUint::from_bytes_be(&value.to_be_bytes::<32>())
    }

    #[test]
    fn test_flash_fee_examples() {
        assert_eq!(flash_fee(U256::from(10_000u64)).unwrap(), U256::from(5u64));
        assert_eq!(flash_fee(U256::from(1_999u64)).unwrap(), U256::ZERO);
        // 10 units of an 18-decimal asset
        let ten = U256::from(10u64) * U256::from(10u64).pow(U256::from(18u64));
        assert_eq!(
            flash_fee(ten).unwrap(),
            U256::from(5u64) * U256::from(10u64).pow(U256::from(15u64))
        );
    }

    #[test]
    fn test_required_collateral_examples() {
        assert_eq!(
            required_collateral(U256::from(15_000u64), U256::from(7_500u64)).unwrap(),
            U256::from(20_000u64)
        );
        assert_eq!(
            required_collateral(U256::from(10u64), U256::from(3u64)).unwrap(),
            U256::from(33_333u64)
        );
        assert_eq!(
            required_collateral(U256::from(15_000u64), U256::ZERO).unwrap(),
            U256::ZERO
        );
    }

    #[test]
    fn test_required_return_rounds_buffer_up() {
        assert_eq!(
            required_return(U256::from(15_000u64)).unwrap(),
            U256::from(15_300u64)
        );
        assert_eq!(required_return(U256::from(1u64)).unwrap(), U256::from(2u64));
        assert_eq!(required_return(U256::from(49u64)).unwrap(), U256::from(50u64));
        assert_eq!(required_return(U256::from(50u64)).unwrap(), U256::from(51u64));
    }

    #[test]
    fn test_required_return_overflow_is_reported() {
        assert!(matches!(
            required_return(U256::MAX),
            Err(OrchestratorError::Arithmetic(_))
        ));
    }

    #[test]
    fn test_verify_return_accepts_profit() {
        let borrow = U256::from(15_000u64);
        let mut snapshot = BalanceSnapshot::new(U256::from(15_000u64));
        snapshot.after(U256::from(15_100u64));

        assert_eq!(verify_return(&snapshot, borrow).unwrap(), U256::from(15_100u64));
    }

    #[test]
    fn test_verify_return_counts_pre_existing_balance() {
        let borrow = U256::from(15_000u64);
        // 500 was already held before the run
        let mut snapshot = BalanceSnapshot::new(U256::from(15_500u64));
        snapshot.after(U256::from(15_500u64));

        assert_eq!(verify_return(&snapshot, borrow).unwrap(), U256::from(15_000u64));
    }

    #[test]
    fn test_verify_return_rejects_short_balance() {
        let borrow = U256::from(15_000u64);
        let mut snapshot = BalanceSnapshot::new(U256::from(15_000u64));
        snapshot.after(U256::from(14_999u64));

        assert_eq!(
            verify_return(&snapshot, borrow),
            Err(OrchestratorError::InsufficientReturn {
                expected: borrow,
                actual: U256::from(14_999u64),
            })
        );
    }

    proptest! {
        #[test]
        fn test_flash_fee_matches_exact_formula(amount in any::<[u8; 30]>()) {
            let mut bytes = [0u8; 32];
            bytes[2..].copy_from_slice(&amount);
            let amount = U256::from_be_bytes(bytes);

            let expected = to_big(amount) * BigUint::from(5u32) / BigUint::from(10_000u32);
            prop_assert_eq!(to_big(flash_fee(amount).unwrap()), expected);
        }

        #[test]
        fn test_required_collateral_matches_exact_formula(borrow in any::<u128>(), ltv in 0u64..20_000) {
            let result = required_collateral(U256::from(borrow), U256::from(ltv)).unwrap();
            if ltv == 0 {
                prop_assert_eq!(result, U256::ZERO);
            } else {
                let expected = BigUint::from(borrow) * BigUint::from(10_000u32) / BigUint::from(ltv);
                prop_assert_eq!(to_big(result), expected);
            }
        }

        #[test]
        fn test_required_return_covers_two_percent(borrow in any::<u128>()) {
            let borrow = U256::from(borrow);
            let required = required_return(borrow).unwrap();
            let buffer = required - borrow;

            prop_assert!(buffer * U256::from(50u64) >= borrow);
            prop_assert!(buffer * U256::from(50u64) < borrow + U256::from(50u64));
        }
    }
}

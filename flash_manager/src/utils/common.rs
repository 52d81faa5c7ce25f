//! Common utility and helper functions that are used across the project

use std::str::FromStr;

use alloy_primitives::{Address, U256};
use candid::Nat;
use num_bigint::BigUint;

use super::error::*;

/// Returns Err if the `caller` is not the `owner`
pub fn only_owner(owner: Address, caller: Address) -> OrchestratorResult<()> {
    if caller != owner {
        // only the owner should be able to call this function
        return Err(OrchestratorError::AuthorizationDenied);
    }
    Ok(())
}

/// Converts String to Address and returns OrchestratorError on failure
pub fn string_to_address(input: &str) -> OrchestratorResult<Address> {
    Address::from_str(input).map_err(|err| OrchestratorError::DecodingError(format!("{:#?}", err)))
}

/// Converts values of type `Nat` to `U256`
pub fn nat_to_u256(n: &Nat) -> OrchestratorResult<U256> {
    let be_bytes = n.0.to_bytes_be();
    if be_bytes.len() > 32 {
        return Err(OrchestratorError::DecodingError("The `Nat` input length exceedes 32 bytes when converted to big-endian bytes representation.".to_string()));
    }
    // Ensure the byte array is exactly 32 bytes long
    let mut padded_bytes = [0u8; 32];
    let start_pos = 32 - be_bytes.len();
    padded_bytes[start_pos..].copy_from_slice(&be_bytes);

    Ok(U256::from_be_bytes(padded_bytes))
}

/// Converts values of type `U256` to `Nat`
pub fn u256_to_nat(value: &U256) -> Nat {
    Nat(BigUint::from_bytes_be(&value.to_be_bytes::<32>()))
}

/// Computes `value * numerator / denominator` with integer truncation.
/// Fails on overflow of the intermediate product or a zero denominator.
pub fn mul_div(value: U256, numerator: U256, denominator: U256) -> OrchestratorResult<U256> {
    value
        .checked_mul(numerator)
        .ok_or(arithmetic_err("Multiplication overflowed."))?
        .checked_div(denominator)
        .ok_or(arithmetic_err("Denominator was zero."))
}

/// Same as [`mul_div`] but rounds any remainder up.
pub fn mul_div_ceil(value: U256, numerator: U256, denominator: U256) -> OrchestratorResult<U256> {
    let product = value
        .checked_mul(numerator)
        .ok_or(arithmetic_err("Multiplication overflowed."))?;
    if denominator.is_zero() {
        return Err(arithmetic_err("Denominator was zero."));
    }
    let quotient = product / denominator;
    if product % denominator == U256::ZERO {
        Ok(quotient)
    } else {
        quotient
            .checked_add(U256::from(1))
            .ok_or(arithmetic_err("Rounding overflowed."))
    }
}

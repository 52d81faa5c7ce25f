//! Flash Manager's Constants

use alloy_primitives::U256;

/// Basis point denominator
pub const BPS_DENOMINATOR: u64 = 10_000;
pub fn bps_denominator() -> U256 {
    U256::from(BPS_DENOMINATOR)
}

/// Flash-borrow fee charged by the lending protocol, in basis points
const FLASH_FEE_BPS_RAW: u64 = 5; // 0.05%
pub fn flash_fee_bps() -> U256 {
    U256::from(FLASH_FEE_BPS_RAW)
}

/// Slippage/fee buffer the executor is asked to return on top of the dispatched amount
const RETURN_BUFFER_BPS_RAW: u64 = 200; // 2%
pub fn return_buffer_bps() -> U256 {
    U256::from(RETURN_BUFFER_BPS_RAW)
}

/// Referral code forwarded with every lending protocol call
pub const REFERRAL_CODE: u16 = 0;

/// Repay amount meaning "everything outstanding"
pub fn repay_all() -> U256 {
    U256::MAX
}

/// Scale used for the health factor
pub const HEALTH_FACTOR_SCALE: u128 = 1_000_000_000_000_000_000; // e18
pub fn health_factor_scale() -> U256 {
    U256::from(HEALTH_FACTOR_SCALE)
}

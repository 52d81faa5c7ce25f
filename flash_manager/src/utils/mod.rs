//! Utility and helper functions needed for:
//! - Error handling
//! - Ownership checks
//! - Checked basis-point arithmetic
//! - Type casting between `U256`, `Nat` and strings

pub mod common;
pub mod error;

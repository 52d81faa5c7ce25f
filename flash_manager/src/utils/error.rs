use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::orchestrator::stage::RunStage;

/// Flash Manager Result
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Flash Manager Errors
#[derive(Clone, Debug, Error, PartialEq)]
pub enum OrchestratorError {
    /// A run parameter or admin amount is zero
    #[error("invalid amount: {0}")]
    InvalidAmount(&'static str),
    /// An address parameter is the null address
    #[error("invalid address: {0}")]
    InvalidAddress(&'static str),
    /// The executor address holds no code
    #[error("target must be a contract: {0}")]
    TargetMustBeContract(Address),
    /// The resumption handler was invoked by someone other than the lending protocol,
    /// or on behalf of a run this orchestrator did not start
    #[error("unauthorized callback from {0}")]
    UnauthorizedCallback(Address),
    /// The executor reverted or reported failure
    #[error("executor {0} failed: {1}")]
    ExecutorFailed(Address, String),
    /// Less than the dispatched amount came back from the executor
    #[error("insufficient return: expected {expected}, got {actual}")]
    InsufficientReturn { expected: U256, actual: U256 },
    /// Caller is not the owner
    #[error("authorization denied")]
    AuthorizationDenied,
    /// A run is already in progress
    #[error("a run is already in progress")]
    Locked,
    /// The state machine was asked to move out of order
    #[error("invalid stage transition: {from:?} -> {to:?}")]
    InvalidStage { from: RunStage, to: RunStage },
    /// Ledger rejected a transfer
    #[error("insufficient balance of {token} for {account}: needed {needed}, available {available}")]
    InsufficientBalance {
        token: Address,
        account: Address,
        needed: U256,
        available: U256,
    },
    /// Ledger rejected a `transfer_from`
    #[error("insufficient allowance of {token} from {owner} to {spender}: needed {needed}, available {available}")]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
        needed: U256,
        available: U256,
    },
    /// The lending protocol rejected an operation
    #[error("lending protocol: {0}")]
    Protocol(String),
    /// Decoding issue
    #[error("decoding error: {0}")]
    DecodingError(String),
    /// Arithmetic error
    #[error("arithmetic error: {0}")]
    Arithmetic(String),
    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),
    /// Unknown/Custom error
    #[error("{0}")]
    Custom(String),
}

pub fn arithmetic_err<S: AsRef<str>>(s: S) -> OrchestratorError {
    OrchestratorError::Arithmetic(s.as_ref().to_string())
}

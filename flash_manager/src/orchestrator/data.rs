//! Mutable orchestrator data

use alloy_primitives::U256;

/// The only state the orchestrator mutates outside of a run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrchestratorData {
    /// Advisory minimum profit. A run below it is annotated, never rejected.
    pub profit_threshold: U256,
}

impl OrchestratorData {
    /// Sets the profit threshold, returning the previous value.
    pub fn replace_profit_threshold(&mut self, profit_threshold: U256) -> U256 {
        std::mem::replace(&mut self.profit_threshold, profit_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_returns_previous() {
        let mut data = OrchestratorData::default();
        assert_eq!(data.replace_profit_threshold(U256::from(3u64)), U256::ZERO);
        assert_eq!(data.replace_profit_threshold(U256::from(9u64)), U256::from(3u64));
        assert_eq!(data.profit_threshold, U256::from(9u64));
    }
}

use alloy_primitives::{Address, U256};
use serde::Serialize;
use tracing::info;

use crate::host::Host;

/// Events emitted by the orchestrator
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum OrchestratorEvent {
    RunInitiated {
        collateral_amount: U256,
        borrow_amount: U256,
        executor: Address,
        timestamp: u64,
    },
    CollateralDeposited {
        asset: Address,
        amount: U256,
    },
    BorrowExecuted {
        asset: Address,
        amount: U256,
    },
    ArbitrageExecuted {
        executor: Address,
        borrow_amount: U256,
        returned_amount: U256,
    },
    StrategyCompleted {
        final_balance: U256,
        timestamp: u64,
    },
    ThresholdUpdated {
        old: U256,
        new: U256,
    },
    Swept {
        token: Address,
        amount: U256,
        timestamp: u64,
    },
}

impl OrchestratorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OrchestratorEvent::RunInitiated { .. } => "RunInitiated",
            OrchestratorEvent::CollateralDeposited { .. } => "CollateralDeposited",
            OrchestratorEvent::BorrowExecuted { .. } => "BorrowExecuted",
            OrchestratorEvent::ArbitrageExecuted { .. } => "ArbitrageExecuted",
            OrchestratorEvent::StrategyCompleted { .. } => "StrategyCompleted",
            OrchestratorEvent::ThresholdUpdated { .. } => "ThresholdUpdated",
            OrchestratorEvent::Swept { .. } => "Swept",
        }
    }
}

/// Journal entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    pub timestamp: u64,
    pub emitter: Address,
    pub event: OrchestratorEvent,
    pub note: Option<String>,
}

/// Builder for journal entries
impl JournalEntry {
    /// Create a new instance of a journal entry
    /// Fills the `emitter` and `event` fields
    pub fn new(emitter: Address, event: OrchestratorEvent) -> Self {
        Self {
            timestamp: 0,
            emitter,
            event,
            note: None,
        }
    }

    /// Fills the `note` field of the entry
    pub fn note<S: AsRef<str>>(&mut self, text: S) -> &mut Self {
        self.note = Some(text.as_ref().to_string());
        self
    }

    /// Commits the entry to the host's event log, stamped with the host's time.
    /// The entry is discarded together with everything else if the run reverts.
    pub fn commit(&mut self, host: &dyn Host) {
        self.timestamp = host.timestamp();
        info!(
            emitter = %self.emitter,
            event = self.event.name(),
            note = self.note.as_deref().unwrap_or_default(),
            "{:?}",
            self.event
        );
        host.emit(self.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;

    #[test]
    fn test_commit_stamps_and_records() {
        let chain = Chain::new(1_700_000_000);
        let emitter = Address::repeat_byte(0x0a);

        JournalEntry::new(
            emitter,
            OrchestratorEvent::ThresholdUpdated {
                old: U256::ZERO,
                new: U256::from(7u64),
            },
        )
        .note("threshold raised")
        .commit(&chain);

        let events = chain.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, 1_700_000_000);
        assert_eq!(events[0].emitter, emitter);
        assert_eq!(events[0].event.name(), "ThresholdUpdated");
        assert_eq!(events[0].note.as_deref(), Some("threshold raised"));
    }

    #[test]
    fn test_events_serialize_with_their_name() {
        let event = OrchestratorEvent::BorrowExecuted {
            asset: Address::repeat_byte(0x02),
            amount: U256::from(15_000u64),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "BorrowExecuted");
        assert!(json["amount"].is_string());
    }
}

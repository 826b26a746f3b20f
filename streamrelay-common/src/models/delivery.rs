// File: streamrelay-common/src/models/delivery.rs

/// Result of a single notification POST. Failures are terminal for that one
/// notification; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { status: u16 },
    Failed { reason: String },
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

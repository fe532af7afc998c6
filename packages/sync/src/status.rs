// ABOUTME: Status translation between Linear lifecycle states and Twenty delivery statuses
// ABOUTME: Ordered rules with fuzzy containment matching and a guaranteed default

use dealbridge_core::DeliveryStatus;

/// Result of translating a project state: the CRM delivery status plus the
/// canonical progress fraction for that lifecycle bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateTranslation {
    pub delivery_status: DeliveryStatus,
    pub progress: f64,
}

struct StateRule {
    key: &'static str,
    delivery_status: DeliveryStatus,
    progress: f64,
}

/// Evaluated top-down: exact key match first, then substring containment
/// against the normalized input. Progress is monotone across the lifecycle.
const STATE_RULES: &[StateRule] = &[
    StateRule { key: "backlog", delivery_status: DeliveryStatus::Initiated, progress: 0.0 },
    StateRule { key: "planned", delivery_status: DeliveryStatus::Initiated, progress: 0.1 },
    StateRule { key: "in progress", delivery_status: DeliveryStatus::InProgress, progress: 0.4 },
    StateRule { key: "in-progress", delivery_status: DeliveryStatus::InProgress, progress: 0.4 },
    StateRule { key: "started", delivery_status: DeliveryStatus::InProgress, progress: 0.4 },
    StateRule { key: "done", delivery_status: DeliveryStatus::Delivered, progress: 1.0 },
    StateRule { key: "completed", delivery_status: DeliveryStatus::Delivered, progress: 1.0 },
    StateRule { key: "finished", delivery_status: DeliveryStatus::Delivered, progress: 1.0 },
    StateRule { key: "cancelled", delivery_status: DeliveryStatus::Cancelled, progress: 0.0 },
    StateRule { key: "canceled", delivery_status: DeliveryStatus::Cancelled, progress: 0.0 },
    StateRule { key: "archived", delivery_status: DeliveryStatus::Cancelled, progress: 0.0 },
];

/// Default bucket for vendor-added or unknown lifecycle labels. Never blocks
/// a sync.
const DEFAULT_TRANSLATION: StateTranslation = StateTranslation {
    delivery_status: DeliveryStatus::InProgress,
    progress: 0.4,
};

/// Translate a Linear project state label into a Twenty delivery status and
/// progress fraction. Total over arbitrary input.
pub fn translate_state(state: &str) -> StateTranslation {
    let normalized = state.trim().to_lowercase();

    let matched = STATE_RULES
        .iter()
        .find(|rule| rule.key == normalized)
        .or_else(|| STATE_RULES.iter().find(|rule| normalized.contains(rule.key)));

    match matched {
        Some(rule) => StateTranslation {
            delivery_status: rule.delivery_status,
            progress: rule.progress,
        },
        None => DEFAULT_TRANSLATION,
    }
}

/// Reverse direction, used when changes originate in the CRM.
pub fn delivery_to_state(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Initiated => "planned",
        DeliveryStatus::InProgress => "started",
        DeliveryStatus::Delivered => "completed",
        DeliveryStatus::Cancelled => "cancelled",
    }
}

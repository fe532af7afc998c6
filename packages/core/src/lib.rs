// ABOUTME: Core types and outbound API ports for Dealbridge
// ABOUTME: Foundational package shared by the sync engine, API layer, and clients

pub mod api;
pub mod types;

// Re-export main types
pub use types::{
    DeliveryStatus, Issue, Opportunity, OpportunityUpdate, Person, Project, ProjectCreate,
    ProjectUpdate, Stage, SyncStatus, TrackerUser,
};

// Re-export ports and their errors
pub use api::{LinearApi, LinearError, TwentyApi, TwentyError};

/// Convert the canonical progress fraction into Twenty's percentage integer.
///
/// The fraction is the only representation used inside the engine; this is
/// the single conversion point for the CRM's 0-100 field.
pub fn progress_to_percent(fraction: f64) -> u64 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_to_percent_bounds() {
        assert_eq!(progress_to_percent(0.0), 0);
        assert_eq!(progress_to_percent(1.0), 100);
        assert_eq!(progress_to_percent(0.4), 40);
        // Out-of-range inputs clamp instead of wrapping
        assert_eq!(progress_to_percent(-0.5), 0);
        assert_eq!(progress_to_percent(1.7), 100);
    }

    #[test]
    fn test_progress_to_percent_rounds() {
        assert_eq!(progress_to_percent(0.666), 67);
        assert_eq!(progress_to_percent(0.004), 0);
    }
}

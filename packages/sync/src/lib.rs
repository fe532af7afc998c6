// ABOUTME: Synchronization engine between Twenty CRM opportunities and Linear projects
// ABOUTME: Identity linking, status translation, and the directional sync operations

pub mod engine;
pub mod link;
pub mod status;

pub use engine::{SyncEngine, SyncError, SyncOutcome};
pub use link::{embed_opportunity_id, extract_opportunity_id};
pub use status::{delivery_to_state, translate_state, StateTranslation};

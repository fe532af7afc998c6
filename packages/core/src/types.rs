// ABOUTME: Domain type definitions for the Twenty CRM and Linear sides of the bridge
// ABOUTME: Opportunity/Project records, lifecycle enums, and outbound write payloads

use serde::{Deserialize, Deserializer, Serialize};

/// Twenty sales-pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    New,
    Screening,
    Meeting,
    Proposal,
    ClosedWon,
}

/// Twenty-side summary of project-tracking progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Initiated,
    InProgress,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Initiated => "INITIATED",
            DeliveryStatus::InProgress => "IN_PROGRESS",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Outcome of the most recent sync attempt, recorded on the opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Synced,
    Pending,
    Error,
}

/// A Twenty CRM opportunity as received from webhooks and the REST API.
///
/// The custom sync fields (`linearprojectid`, `projectprogress`,
/// `deliverystatus`, `syncstatus`) use Twenty's lowercase custom-field
/// naming; everything else is camelCase.
#[derive(Debug, Clone, Deserialize)]
pub struct Opportunity {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub stage: Option<Stage>,
    #[serde(default, rename = "closeDate")]
    pub close_date: Option<String>,
    #[serde(default, rename = "pointOfContactId")]
    pub point_of_contact_id: Option<String>,
    #[serde(default, rename = "linearprojectid")]
    pub linear_project_id: Option<String>,
    #[serde(default, rename = "projectprogress", deserialize_with = "lenient_fraction")]
    pub project_progress: Option<f64>,
    #[serde(default, rename = "deliverystatus")]
    pub delivery_status: Option<DeliveryStatus>,
    #[serde(default, rename = "syncstatus")]
    pub sync_status: Option<SyncStatus>,
}

impl Opportunity {
    /// An opportunity is linked iff its Linear project id is non-empty.
    pub fn is_linked(&self) -> bool {
        self.linear_project_id
            .as_deref()
            .is_some_and(|id| !id.is_empty())
    }
}

/// Twenty person record, reduced to what the sync needs.
#[derive(Debug, Clone, Deserialize)]
pub struct Person {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A Linear project as returned by the GraphQL API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub lead: Option<TrackerUser>,
    #[serde(default)]
    pub target_date: Option<String>,
    /// Vendor-defined lifecycle label (backlog/planned/started/...); not a
    /// closed enum.
    #[serde(default)]
    pub state: Option<String>,
    /// Fraction in [0, 1].
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A Linear user.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A Linear issue, reduced to what progress recomputation and
/// comment-to-project resolution need.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl Issue {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Partial update pushed to a Twenty opportunity. `None` fields are omitted
/// from the PATCH; `project_progress` carries the canonical fraction and is
/// converted to a percentage integer at the client boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpportunityUpdate {
    pub name: Option<String>,
    pub close_date: Option<String>,
    pub point_of_contact_id: Option<String>,
    pub linear_project_id: Option<String>,
    pub project_progress: Option<f64>,
    pub delivery_status: Option<DeliveryStatus>,
    pub sync_status: Option<SyncStatus>,
}

impl OpportunityUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.close_date.is_none()
            && self.point_of_contact_id.is_none()
            && self.linear_project_id.is_none()
            && self.project_progress.is_none()
            && self.delivery_status.is_none()
            && self.sync_status.is_none()
    }
}

/// Input for creating a Linear project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectCreate {
    pub name: String,
    /// Carries the embedded opportunity reference token.
    pub description: String,
    pub lead_id: Option<String>,
    pub target_date: Option<String>,
}

/// Partial update pushed to a Linear project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub state: Option<String>,
    pub target_date: Option<String>,
    pub lead_id: Option<String>,
}

impl ProjectUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.state.is_none()
            && self.target_date.is_none()
            && self.lead_id.is_none()
    }
}

/// Twenty has historically stored progress both as a bare number and as a
/// numeric string; accept either shape.
fn lenient_fraction<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

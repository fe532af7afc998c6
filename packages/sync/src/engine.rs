// ABOUTME: The directional sync operations between Twenty opportunities and Linear projects
// ABOUTME: Create-on-close, bidirectional field pushes, progress recompute, and mirrors

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use dealbridge_core::{
    DeliveryStatus, LinearApi, LinearError, Opportunity, OpportunityUpdate, ProjectCreate,
    ProjectUpdate, SyncStatus, TwentyApi, TwentyError,
};

use crate::link::{embed_opportunity_id, extract_opportunity_id};
use crate::status::{delivery_to_state, translate_state};

/// Sync operation errors. Downstream API failures abort the operation and
/// surface at the request boundary; there is no local retry.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Twenty(#[from] TwentyError),
    #[error(transparent)]
    Linear(#[from] LinearError),
}

/// Result of one sync operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A Linear project was created and linked to the opportunity.
    Created {
        project_id: String,
        url: Option<String>,
    },
    /// The counterpart record was updated.
    Synced(&'static str),
    /// Nothing to do for an unlinked record or an empty change set. Not an error.
    NoOp(&'static str),
}

/// The synchronization engine. Holds the two outbound API ports; every
/// operation reads the required fields, applies translation, and issues at
/// most one corrective write per system.
pub struct SyncEngine {
    twenty: Arc<dyn TwentyApi>,
    linear: Arc<dyn LinearApi>,
}

impl SyncEngine {
    pub fn new(twenty: Arc<dyn TwentyApi>, linear: Arc<dyn LinearApi>) -> Self {
        Self { twenty, linear }
    }

    /// Entry point for opportunity updates from Twenty.
    ///
    /// Creation is gated solely on (`stage` changed to CLOSED_WON, no linked
    /// project yet); a redelivered close event after the link was written
    /// fails that guard and becomes a no-op. The guard is a plain
    /// read-then-write field check; Twenty offers no conditional writes, so
    /// two truly concurrent deliveries of the same close event can still
    /// race. Upstream per-record serialized delivery makes that acceptable.
    pub async fn handle_opportunity_update(
        &self,
        opportunity: &Opportunity,
        updated_fields: &[String],
    ) -> Result<SyncOutcome, SyncError> {
        let stage_closed_won = updated_fields.iter().any(|f| f == "stage")
            && opportunity.stage == Some(dealbridge_core::Stage::ClosedWon);

        if stage_closed_won && !opportunity.is_linked() {
            return self.create_project_on_close(opportunity).await;
        }

        if opportunity.is_linked() && !updated_fields.is_empty() {
            return self.push_opportunity_changes(opportunity, updated_fields).await;
        }

        Ok(SyncOutcome::NoOp("no action needed"))
    }

    /// Create the Linear project for a freshly closed-won opportunity and
    /// write the link back, transitioning the opportunity to LINKED.
    async fn create_project_on_close(
        &self,
        opportunity: &Opportunity,
    ) -> Result<SyncOutcome, SyncError> {
        info!("Processing CLOSED_WON opportunity: {}", opportunity.id);

        let name = opportunity
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Untitled Deal".to_string());

        // Best-effort: a missing lead never blocks project creation
        let lead_id = match &opportunity.point_of_contact_id {
            Some(contact_id) => self.resolve_lead_id(contact_id).await,
            None => None,
        };

        let description = embed_opportunity_id(&format!("Deal: {name}"), &opportunity.id);

        let project = self
            .linear
            .create_project(&ProjectCreate {
                name,
                description,
                lead_id,
                target_date: opportunity.close_date.clone(),
            })
            .await?;

        info!("Linear project created: {}", project.id);

        self.twenty
            .update_opportunity(
                &opportunity.id,
                &OpportunityUpdate {
                    linear_project_id: Some(project.id.clone()),
                    project_progress: Some(0.0),
                    delivery_status: Some(DeliveryStatus::Initiated),
                    sync_status: Some(SyncStatus::Synced),
                    ..Default::default()
                },
            )
            .await?;

        Ok(SyncOutcome::Created {
            project_id: project.id,
            url: project.url,
        })
    }

    /// Push the changed subset of an already-linked opportunity to its
    /// project: name, close date → target date, point of contact → lead,
    /// delivery status → project state.
    async fn push_opportunity_changes(
        &self,
        opportunity: &Opportunity,
        updated_fields: &[String],
    ) -> Result<SyncOutcome, SyncError> {
        let changed = |field: &str| updated_fields.iter().any(|f| f == field);
        let mut update = ProjectUpdate::default();

        if changed("name") {
            update.name = opportunity.name.clone().filter(|n| !n.is_empty());
        }
        if changed("closeDate") {
            update.target_date = opportunity.close_date.clone();
        }
        if changed("deliverystatus") {
            update.state = opportunity
                .delivery_status
                .map(|status| delivery_to_state(status).to_string());
        }
        if changed("pointOfContactId") {
            if let Some(contact_id) = &opportunity.point_of_contact_id {
                update.lead_id = self.resolve_lead_id(contact_id).await;
            }
        }

        if update.is_empty() {
            return Ok(SyncOutcome::NoOp("no syncable fields changed"));
        }

        // Safe to unwrap the link: the caller checked is_linked()
        let project_id = opportunity.linear_project_id.clone().unwrap_or_default();
        info!("Syncing Twenty changes to Linear project {}", project_id);

        match self.linear.update_project(&project_id, &update).await {
            Ok(()) => {
                self.record_sync_status(&opportunity.id, SyncStatus::Synced).await;
                Ok(SyncOutcome::Synced("synced to Linear"))
            }
            Err(e) => {
                self.record_sync_status(&opportunity.id, SyncStatus::Error).await;
                Err(e.into())
            }
        }
    }

    /// A note created in Twenty mirrors to the linked project as a comment.
    pub async fn handle_note_created(
        &self,
        opportunity_id: &str,
        body: &str,
    ) -> Result<SyncOutcome, SyncError> {
        let opportunity = self.twenty.get_opportunity(opportunity_id).await?;
        let Some(project_id) = opportunity.linear_project_id.filter(|id| !id.is_empty()) else {
            return Ok(SyncOutcome::NoOp("no linked Linear project"));
        };

        info!("Syncing note to Linear project {}", project_id);
        self.linear.create_comment(&project_id, body).await?;
        Ok(SyncOutcome::Synced("note synced to Linear"))
    }

    /// An attachment created in Twenty mirrors to the linked project as a
    /// markdown comment; Linear attachment creation is outside the contract.
    pub async fn handle_crm_attachment_created(
        &self,
        opportunity_id: &str,
        url: &str,
        name: &str,
    ) -> Result<SyncOutcome, SyncError> {
        let opportunity = self.twenty.get_opportunity(opportunity_id).await?;
        let Some(project_id) = opportunity.linear_project_id.filter(|id| !id.is_empty()) else {
            return Ok(SyncOutcome::NoOp("no linked Linear project"));
        };

        info!("Syncing attachment to Linear project {}", project_id);
        let body = format!("📎 Attachment: [{name}]({url})");
        self.linear.create_comment(&project_id, &body).await?;
        Ok(SyncOutcome::Synced("attachment synced to Linear"))
    }

    /// A project update from Linear pushes delivery status, progress, target
    /// date, and the project lead back to the linked opportunity.
    pub async fn handle_project_update(&self, project_id: &str) -> Result<SyncOutcome, SyncError> {
        let project = self.linear.get_project(project_id).await?;
        let Some(opportunity_id) = project
            .description
            .as_deref()
            .and_then(extract_opportunity_id)
        else {
            return Ok(SyncOutcome::NoOp("no linked opportunity"));
        };

        let state = project.state.clone().unwrap_or_default();
        let translation = translate_state(&state);
        info!(
            "Syncing project {} ({}) -> opportunity {}: {:?}",
            project_id, state, opportunity_id, translation.delivery_status
        );

        // Lead mirrors to the point of contact best-effort; a miss never
        // blocks the status push
        let point_of_contact_id = match project.lead.as_ref().and_then(|lead| lead.email.clone()) {
            Some(email) => self.resolve_contact_id(&email).await,
            None => None,
        };

        self.twenty
            .update_opportunity(
                &opportunity_id,
                &OpportunityUpdate {
                    delivery_status: Some(translation.delivery_status),
                    project_progress: Some(translation.progress),
                    close_date: project.target_date.clone(),
                    point_of_contact_id,
                    sync_status: Some(SyncStatus::Synced),
                    ..Default::default()
                },
            )
            .await?;

        Ok(SyncOutcome::Synced("project update synced to Twenty"))
    }

    /// A milestone update pushes the project's own progress fraction to the
    /// linked opportunity.
    pub async fn handle_milestone_update(&self, project_id: &str) -> Result<SyncOutcome, SyncError> {
        let project = self.linear.get_project(project_id).await?;
        let Some(opportunity_id) = project
            .description
            .as_deref()
            .and_then(extract_opportunity_id)
        else {
            return Ok(SyncOutcome::NoOp("no linked opportunity"));
        };

        let progress = project.progress.unwrap_or(0.0);
        info!(
            "Syncing milestone update for project {} -> opportunity {}: progress {}",
            project_id, opportunity_id, progress
        );

        self.twenty
            .update_opportunity(
                &opportunity_id,
                &OpportunityUpdate {
                    project_progress: Some(progress),
                    sync_status: Some(SyncStatus::Synced),
                    ..Default::default()
                },
            )
            .await?;

        Ok(SyncOutcome::Synced("milestone update synced to Twenty"))
    }

    /// An issue update recomputes project progress by recounting completed
    /// versus total issues under the project.
    pub async fn handle_issue_update(&self, project_id: &str) -> Result<SyncOutcome, SyncError> {
        let Some(opportunity_id) = self.linked_opportunity_id(project_id).await? else {
            return Ok(SyncOutcome::NoOp("no linked opportunity"));
        };

        let issues = self.linear.get_project_issues(project_id).await?;
        let total = issues.len();
        let completed = issues.iter().filter(|i| i.is_completed()).count();
        let progress = if total > 0 {
            completed as f64 / total as f64
        } else {
            0.0
        };

        info!(
            "Recomputed progress for project {}: {}/{} issues completed",
            project_id, completed, total
        );

        self.twenty
            .update_opportunity(
                &opportunity_id,
                &OpportunityUpdate {
                    project_progress: Some(progress),
                    sync_status: Some(SyncStatus::Synced),
                    ..Default::default()
                },
            )
            .await?;

        Ok(SyncOutcome::Synced("issue update synced to Twenty"))
    }

    /// A comment created in Linear mirrors to the linked opportunity as a
    /// note. Comments on issues resolve the owning project first.
    pub async fn handle_comment_created(
        &self,
        project_id: Option<&str>,
        issue_id: Option<&str>,
        body: &str,
    ) -> Result<SyncOutcome, SyncError> {
        let Some(project_id) = self.resolve_project_id(project_id, issue_id).await? else {
            return Ok(SyncOutcome::NoOp("no linked project found"));
        };
        let Some(opportunity_id) = self.linked_opportunity_id(&project_id).await? else {
            return Ok(SyncOutcome::NoOp("no linked opportunity"));
        };

        info!("Syncing Linear comment to Twenty note for {}", opportunity_id);
        self.twenty.create_note(&opportunity_id, body).await?;
        Ok(SyncOutcome::Synced("comment synced to Twenty"))
    }

    /// An attachment created in Linear mirrors to the linked opportunity.
    pub async fn handle_attachment_created(
        &self,
        project_id: Option<&str>,
        issue_id: Option<&str>,
        url: &str,
        title: Option<&str>,
    ) -> Result<SyncOutcome, SyncError> {
        let Some(project_id) = self.resolve_project_id(project_id, issue_id).await? else {
            return Ok(SyncOutcome::NoOp("no linked project found"));
        };
        let Some(opportunity_id) = self.linked_opportunity_id(&project_id).await? else {
            return Ok(SyncOutcome::NoOp("no linked opportunity"));
        };

        info!(
            "Syncing Linear attachment to Twenty for {}",
            opportunity_id
        );
        self.twenty
            .create_attachment(
                &opportunity_id,
                url,
                title.unwrap_or("Attachment from Linear"),
            )
            .await?;
        Ok(SyncOutcome::Synced("attachment synced to Twenty"))
    }

    /// Point of contact → Linear lead. Lookup misses are logged and skipped,
    /// never fatal.
    async fn resolve_lead_id(&self, contact_id: &str) -> Option<String> {
        let person = match self.twenty.get_person(contact_id).await {
            Ok(person) => person,
            Err(e) => {
                warn!("Error fetching point of contact {}: {}", contact_id, e);
                return None;
            }
        };

        let email = person.email?;
        match self.linear.get_user_by_email(&email).await {
            Ok(Some(user)) => Some(user.id),
            Ok(None) => None,
            Err(e) => {
                warn!("Error looking up Linear user for {}: {}", email, e);
                None
            }
        }
    }

    /// Linear lead email → Twenty person id, for the reverse direction.
    /// Lookup misses are logged and skipped, never fatal.
    async fn resolve_contact_id(&self, email: &str) -> Option<String> {
        match self.twenty.get_user_by_email(email).await {
            Ok(Some(person)) => Some(person.id),
            Ok(None) => None,
            Err(e) => {
                warn!("Error looking up Twenty user for {}: {}", email, e);
                None
            }
        }
    }

    /// Events addressed to an issue carry no project id; resolve through the
    /// issue's owning project.
    async fn resolve_project_id(
        &self,
        project_id: Option<&str>,
        issue_id: Option<&str>,
    ) -> Result<Option<String>, SyncError> {
        if let Some(id) = project_id.filter(|id| !id.is_empty()) {
            return Ok(Some(id.to_string()));
        }
        if let Some(issue_id) = issue_id.filter(|id| !id.is_empty()) {
            let issue = self.linear.get_issue(issue_id).await?;
            return Ok(issue.project_id);
        }
        Ok(None)
    }

    /// Discover the linked opportunity through the embedded description token.
    async fn linked_opportunity_id(&self, project_id: &str) -> Result<Option<String>, SyncError> {
        let project = self.linear.get_project(project_id).await?;
        Ok(project
            .description
            .as_deref()
            .and_then(extract_opportunity_id))
    }

    /// Best-effort sync-status bookkeeping on the opportunity; failures here
    /// are logged, not surfaced.
    async fn record_sync_status(&self, opportunity_id: &str, status: SyncStatus) {
        let update = OpportunityUpdate {
            sync_status: Some(status),
            ..Default::default()
        };
        if let Err(e) = self.twenty.update_opportunity(opportunity_id, &update).await {
            warn!(
                "Failed to record sync status for opportunity {}: {}",
                opportunity_id, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dealbridge_core::{Issue, Person, Project, Stage, TrackerUser};
    use mockall::mock;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    mock! {
        pub Twenty {}

        #[async_trait]
        impl TwentyApi for Twenty {
            async fn get_opportunity(&self, id: &str) -> Result<Opportunity, TwentyError>;
            async fn update_opportunity(
                &self,
                id: &str,
                update: &OpportunityUpdate,
            ) -> Result<(), TwentyError>;
            async fn get_person(&self, id: &str) -> Result<Person, TwentyError>;
            async fn get_user_by_email(&self, email: &str) -> Result<Option<Person>, TwentyError>;
            async fn create_note(&self, opportunity_id: &str, body: &str) -> Result<(), TwentyError>;
            async fn create_attachment(
                &self,
                opportunity_id: &str,
                url: &str,
                name: &str,
            ) -> Result<(), TwentyError>;
        }
    }

    mock! {
        pub Linear {}

        #[async_trait]
        impl LinearApi for Linear {
            async fn create_project(&self, input: &ProjectCreate) -> Result<Project, LinearError>;
            async fn update_project(
                &self,
                id: &str,
                update: &ProjectUpdate,
            ) -> Result<(), LinearError>;
            async fn get_project(&self, id: &str) -> Result<Project, LinearError>;
            async fn get_issue(&self, id: &str) -> Result<Issue, LinearError>;
            async fn get_project_issues(&self, project_id: &str) -> Result<Vec<Issue>, LinearError>;
            async fn get_user_by_email(
                &self,
                email: &str,
            ) -> Result<Option<TrackerUser>, LinearError>;
            async fn create_comment(&self, project_id: &str, body: &str) -> Result<(), LinearError>;
        }
    }

    fn engine(twenty: MockTwenty, linear: MockLinear) -> SyncEngine {
        SyncEngine::new(Arc::new(twenty), Arc::new(linear))
    }

    fn opportunity(id: &str) -> Opportunity {
        Opportunity {
            id: id.to_string(),
            name: None,
            stage: None,
            close_date: None,
            point_of_contact_id: None,
            linear_project_id: None,
            project_progress: None,
            delivery_status: None,
            sync_status: None,
        }
    }

    fn project(id: &str, description: &str, state: Option<&str>) -> Project {
        Project {
            id: id.to_string(),
            name: Some("Acme Deal".to_string()),
            description: Some(description.to_string()),
            lead: None,
            target_date: None,
            state: state.map(String::from),
            progress: None,
            url: None,
        }
    }

    fn issue(id: &str, completed: bool) -> Issue {
        Issue {
            id: id.to_string(),
            title: None,
            completed_at: completed.then(|| "2024-02-01T00:00:00Z".to_string()),
            project_id: None,
        }
    }

    fn updated(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[tokio::test]
    async fn test_closed_won_creates_project_and_writes_back() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        linear
            .expect_create_project()
            .withf(|input: &ProjectCreate| {
                input.name == "Acme Deal"
                    && input.description.contains("[TwentyOpportunityId: opp1]")
                    && input.target_date.as_deref() == Some("2024-01-01")
                    && input.lead_id.is_none()
            })
            .times(1)
            .returning(|_| Ok(project("proj-new", "", None)));

        twenty
            .expect_update_opportunity()
            .withf(|id: &str, update: &OpportunityUpdate| {
                id == "opp1"
                    && update.linear_project_id.as_deref() == Some("proj-new")
                    && update.project_progress == Some(0.0)
                    && update.delivery_status == Some(DeliveryStatus::Initiated)
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut opp = opportunity("opp1");
        opp.name = Some("Acme Deal".to_string());
        opp.stage = Some(Stage::ClosedWon);
        opp.close_date = Some("2024-01-01".to_string());
        opp.linear_project_id = Some(String::new());

        let outcome = engine(twenty, linear)
            .handle_opportunity_update(&opp, &updated(&["stage"]))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Created {
                project_id: "proj-new".to_string(),
                url: None
            }
        );
    }

    #[tokio::test]
    async fn test_replayed_close_event_is_idempotent() {
        // Second delivery: linearprojectid is now set, so the guard fails
        // closed and no project is created.
        let twenty = MockTwenty::new();
        let linear = MockLinear::new();

        let mut opp = opportunity("opp1");
        opp.stage = Some(Stage::ClosedWon);
        opp.linear_project_id = Some("proj-existing".to_string());

        let outcome = engine(twenty, linear)
            .handle_opportunity_update(&opp, &updated(&["stage"]))
            .await
            .unwrap();

        // "stage" is not a pushable field, so the linked branch is a no-op too
        assert_eq!(outcome, SyncOutcome::NoOp("no syncable fields changed"));
    }

    #[tokio::test]
    async fn test_lead_lookup_failure_does_not_block_creation() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        twenty
            .expect_get_person()
            .with(eq("person-1"))
            .times(1)
            .returning(|_| {
                Err(TwentyError::Api {
                    status: 500,
                    body: "boom".to_string(),
                })
            });

        linear
            .expect_create_project()
            .withf(|input: &ProjectCreate| input.lead_id.is_none())
            .times(1)
            .returning(|_| Ok(project("proj-new", "", None)));

        twenty
            .expect_update_opportunity()
            .times(1)
            .returning(|_, _| Ok(()));

        let mut opp = opportunity("opp1");
        opp.stage = Some(Stage::ClosedWon);
        opp.point_of_contact_id = Some("person-1".to_string());

        let outcome = engine(twenty, linear)
            .handle_opportunity_update(&opp, &updated(&["stage"]))
            .await
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Created { .. }));
    }

    #[tokio::test]
    async fn test_lead_resolved_through_contact_email() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        twenty
            .expect_get_person()
            .with(eq("person-1"))
            .times(1)
            .returning(|_| {
                Ok(Person {
                    id: "person-1".to_string(),
                    email: Some("jo@acme.test".to_string()),
                })
            });
        linear
            .expect_get_user_by_email()
            .with(eq("jo@acme.test"))
            .times(1)
            .returning(|_| {
                Ok(Some(TrackerUser {
                    id: "user-42".to_string(),
                    email: Some("jo@acme.test".to_string()),
                    name: Some("Jo".to_string()),
                }))
            });

        linear
            .expect_create_project()
            .withf(|input: &ProjectCreate| input.lead_id.as_deref() == Some("user-42"))
            .times(1)
            .returning(|_| Ok(project("proj-new", "", None)));
        twenty
            .expect_update_opportunity()
            .times(1)
            .returning(|_, _| Ok(()));

        let mut opp = opportunity("opp1");
        opp.stage = Some(Stage::ClosedWon);
        opp.point_of_contact_id = Some("person-1".to_string());

        let outcome = engine(twenty, linear)
            .handle_opportunity_update(&opp, &updated(&["stage"]))
            .await
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Created { .. }));
    }

    #[tokio::test]
    async fn test_linked_update_pushes_changed_subset_only() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        linear
            .expect_update_project()
            .withf(|id: &str, update: &ProjectUpdate| {
                id == "proj-1"
                    && update.name.as_deref() == Some("Renamed Deal")
                    && update.target_date.is_none()
                    && update.lead_id.is_none()
            })
            .times(1)
            .returning(|_, _| Ok(()));

        twenty
            .expect_update_opportunity()
            .withf(|id: &str, update: &OpportunityUpdate| {
                id == "opp1" && update.sync_status == Some(SyncStatus::Synced)
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut opp = opportunity("opp1");
        opp.name = Some("Renamed Deal".to_string());
        opp.close_date = Some("2030-01-01".to_string()); // present but unchanged
        opp.linear_project_id = Some("proj-1".to_string());

        let outcome = engine(twenty, linear)
            .handle_opportunity_update(&opp, &updated(&["name"]))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Synced("synced to Linear"));
    }

    #[tokio::test]
    async fn test_delivery_status_change_maps_to_project_state() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        linear
            .expect_update_project()
            .withf(|_, update: &ProjectUpdate| update.state.as_deref() == Some("completed"))
            .times(1)
            .returning(|_, _| Ok(()));
        twenty
            .expect_update_opportunity()
            .times(1)
            .returning(|_, _| Ok(()));

        let mut opp = opportunity("opp1");
        opp.delivery_status = Some(DeliveryStatus::Delivered);
        opp.linear_project_id = Some("proj-1".to_string());

        let outcome = engine(twenty, linear)
            .handle_opportunity_update(&opp, &updated(&["deliverystatus"]))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Synced("synced to Linear"));
    }

    #[tokio::test]
    async fn test_failed_push_records_error_sync_status() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        linear
            .expect_update_project()
            .times(1)
            .returning(|_, _| {
                Err(LinearError::Api {
                    status: 502,
                    body: "bad gateway".to_string(),
                })
            });

        twenty
            .expect_update_opportunity()
            .withf(|_, update: &OpportunityUpdate| update.sync_status == Some(SyncStatus::Error))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut opp = opportunity("opp1");
        opp.name = Some("Renamed".to_string());
        opp.linear_project_id = Some("proj-1".to_string());

        let result = engine(twenty, linear)
            .handle_opportunity_update(&opp, &updated(&["name"]))
            .await;
        assert!(matches!(result, Err(SyncError::Linear(_))));
    }

    #[tokio::test]
    async fn test_completed_project_syncs_delivered_full_progress() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        let description = embed_opportunity_id("Deal: Acme", "opp2");
        linear
            .expect_get_project()
            .with(eq("proj-1"))
            .times(1)
            .returning(move |_| Ok(project("proj-1", &description, Some("completed"))));

        twenty
            .expect_update_opportunity()
            .withf(|id: &str, update: &OpportunityUpdate| {
                id == "opp2"
                    && update.delivery_status == Some(DeliveryStatus::Delivered)
                    && update.project_progress == Some(1.0)
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = engine(twenty, linear)
            .handle_project_update("proj-1")
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Synced("project update synced to Twenty"));
    }

    #[tokio::test]
    async fn test_unknown_project_state_defaults_to_in_progress() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        let description = embed_opportunity_id("", "opp3");
        linear
            .expect_get_project()
            .times(1)
            .returning(move |_| Ok(project("proj-1", &description, Some("vendor-custom-state"))));

        twenty
            .expect_update_opportunity()
            .withf(|_, update: &OpportunityUpdate| {
                update.delivery_status == Some(DeliveryStatus::InProgress)
            })
            .times(1)
            .returning(|_, _| Ok(()));

        engine(twenty, linear)
            .handle_project_update("proj-1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_project_lead_mirrors_to_point_of_contact() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        let mut proj = project("proj-1", &embed_opportunity_id("", "opp2"), Some("started"));
        proj.lead = Some(TrackerUser {
            id: "user-1".to_string(),
            email: Some("lead@acme.test".to_string()),
            name: None,
        });
        linear
            .expect_get_project()
            .times(1)
            .returning(move |_| Ok(proj.clone()));

        twenty
            .expect_get_user_by_email()
            .with(eq("lead@acme.test"))
            .times(1)
            .returning(|_| {
                Ok(Some(Person {
                    id: "person-9".to_string(),
                    email: Some("lead@acme.test".to_string()),
                }))
            });
        twenty
            .expect_update_opportunity()
            .withf(|id: &str, update: &OpportunityUpdate| {
                id == "opp2" && update.point_of_contact_id.as_deref() == Some("person-9")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        engine(twenty, linear)
            .handle_project_update("proj-1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_project_lead_lookup_miss_does_not_block_sync() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        let mut proj = project("proj-1", &embed_opportunity_id("", "opp2"), Some("started"));
        proj.lead = Some(TrackerUser {
            id: "user-1".to_string(),
            email: Some("ghost@acme.test".to_string()),
            name: None,
        });
        linear
            .expect_get_project()
            .times(1)
            .returning(move |_| Ok(proj.clone()));

        twenty
            .expect_get_user_by_email()
            .times(1)
            .returning(|_| {
                Err(TwentyError::Api {
                    status: 500,
                    body: "boom".to_string(),
                })
            });
        twenty
            .expect_update_opportunity()
            .withf(|_, update: &OpportunityUpdate| {
                update.point_of_contact_id.is_none()
                    && update.delivery_status == Some(DeliveryStatus::InProgress)
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = engine(twenty, linear)
            .handle_project_update("proj-1")
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Synced("project update synced to Twenty"));
    }

    #[tokio::test]
    async fn test_milestone_update_pushes_project_progress() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        let mut proj = project("proj-1", &embed_opportunity_id("", "opp3"), Some("started"));
        proj.progress = Some(0.6);
        linear
            .expect_get_project()
            .with(eq("proj-1"))
            .times(1)
            .returning(move |_| Ok(proj.clone()));

        twenty
            .expect_update_opportunity()
            .withf(|id: &str, update: &OpportunityUpdate| {
                id == "opp3"
                    && update.project_progress == Some(0.6)
                    && update.delivery_status.is_none()
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = engine(twenty, linear)
            .handle_milestone_update("proj-1")
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Synced("milestone update synced to Twenty"));
    }

    #[tokio::test]
    async fn test_milestone_update_without_token_is_noop() {
        let twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        linear
            .expect_get_project()
            .times(1)
            .returning(|_| Ok(project("proj-1", "plain description", None)));

        let outcome = engine(twenty, linear)
            .handle_milestone_update("proj-1")
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::NoOp("no linked opportunity"));
    }

    #[tokio::test]
    async fn test_project_without_token_is_noop() {
        let twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        linear
            .expect_get_project()
            .times(1)
            .returning(|_| Ok(project("proj-1", "plain description", Some("started"))));

        let outcome = engine(twenty, linear)
            .handle_project_update("proj-1")
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::NoOp("no linked opportunity"));
    }

    #[tokio::test]
    async fn test_issue_update_recounts_progress() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        let description = embed_opportunity_id("", "opp4");
        linear
            .expect_get_project()
            .times(1)
            .returning(move |_| Ok(project("proj-1", &description, Some("started"))));
        linear
            .expect_get_project_issues()
            .with(eq("proj-1"))
            .times(1)
            .returning(|_| {
                Ok(vec![
                    issue("i1", true),
                    issue("i2", true),
                    issue("i3", false),
                    issue("i4", false),
                ])
            });

        twenty
            .expect_update_opportunity()
            .withf(|id: &str, update: &OpportunityUpdate| {
                id == "opp4" && update.project_progress == Some(0.5)
            })
            .times(1)
            .returning(|_, _| Ok(()));

        engine(twenty, linear)
            .handle_issue_update("proj-1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_issue_update_without_issues_is_zero_progress() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        let description = embed_opportunity_id("", "opp4");
        linear
            .expect_get_project()
            .times(1)
            .returning(move |_| Ok(project("proj-1", &description, None)));
        linear
            .expect_get_project_issues()
            .times(1)
            .returning(|_| Ok(vec![]));

        twenty
            .expect_update_opportunity()
            .withf(|_, update: &OpportunityUpdate| update.project_progress == Some(0.0))
            .times(1)
            .returning(|_, _| Ok(()));

        engine(twenty, linear)
            .handle_issue_update("proj-1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unlinked_comment_is_noop_with_no_outbound_calls() {
        let twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        linear
            .expect_get_project()
            .times(1)
            .returning(|_| Ok(project("proj-1", "no token here", None)));

        let outcome = engine(twenty, linear)
            .handle_comment_created(Some("proj-1"), None, "hello")
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::NoOp("no linked opportunity"));
    }

    #[tokio::test]
    async fn test_comment_on_issue_resolves_owning_project() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        linear
            .expect_get_issue()
            .with(eq("issue-1"))
            .times(1)
            .returning(|_| {
                Ok(Issue {
                    id: "issue-1".to_string(),
                    title: None,
                    completed_at: None,
                    project_id: Some("proj-1".to_string()),
                })
            });

        let description = embed_opportunity_id("", "opp5");
        linear
            .expect_get_project()
            .with(eq("proj-1"))
            .times(1)
            .returning(move |_| Ok(project("proj-1", &description, None)));

        twenty
            .expect_create_note()
            .withf(|id: &str, body: &str| id == "opp5" && body == "looks good")
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = engine(twenty, linear)
            .handle_comment_created(None, Some("issue-1"), "looks good")
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Synced("comment synced to Twenty"));
    }

    #[tokio::test]
    async fn test_tracker_attachment_mirrors_to_twenty() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        let description = embed_opportunity_id("", "opp6");
        linear
            .expect_get_project()
            .times(1)
            .returning(move |_| Ok(project("proj-1", &description, None)));

        twenty
            .expect_create_attachment()
            .withf(|id: &str, url: &str, name: &str| {
                id == "opp6" && url == "https://files.test/spec.pdf" && name == "spec.pdf"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        engine(twenty, linear)
            .handle_attachment_created(
                Some("proj-1"),
                None,
                "https://files.test/spec.pdf",
                Some("spec.pdf"),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_note_created_mirrors_to_linear_comment() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        twenty
            .expect_get_opportunity()
            .with(eq("opp7"))
            .times(1)
            .returning(|_| {
                let mut opp = opportunity("opp7");
                opp.linear_project_id = Some("proj-7".to_string());
                Ok(opp)
            });

        linear
            .expect_create_comment()
            .withf(|id: &str, body: &str| id == "proj-7" && body == "call notes")
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = engine(twenty, linear)
            .handle_note_created("opp7", "call notes")
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Synced("note synced to Linear"));
    }

    #[tokio::test]
    async fn test_note_on_unlinked_opportunity_is_noop() {
        let mut twenty = MockTwenty::new();
        let linear = MockLinear::new();

        twenty
            .expect_get_opportunity()
            .times(1)
            .returning(|_| Ok(opportunity("opp8")));

        let outcome = engine(twenty, linear)
            .handle_note_created("opp8", "orphan note")
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::NoOp("no linked Linear project"));
    }

    #[tokio::test]
    async fn test_crm_attachment_mirrors_as_markdown_comment() {
        let mut twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        twenty
            .expect_get_opportunity()
            .times(1)
            .returning(|_| {
                let mut opp = opportunity("opp9");
                opp.linear_project_id = Some("proj-9".to_string());
                Ok(opp)
            });

        linear
            .expect_create_comment()
            .withf(|id: &str, body: &str| {
                id == "proj-9" && body.contains("[contract.pdf](https://crm.test/contract.pdf)")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        engine(twenty, linear)
            .handle_crm_attachment_created("opp9", "https://crm.test/contract.pdf", "contract.pdf")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_downstream_failure_surfaces_as_error() {
        let twenty = MockTwenty::new();
        let mut linear = MockLinear::new();

        linear
            .expect_get_project()
            .times(1)
            .returning(|_| {
                Err(LinearError::Network("connection refused".to_string()))
            });

        let result = engine(twenty, linear).handle_project_update("proj-1").await;
        assert!(matches!(result, Err(SyncError::Linear(_))));
    }
}

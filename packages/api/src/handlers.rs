// ABOUTME: Webhook endpoint handlers for the two inbound sources
// ABOUTME: Verify signature over raw bytes, parse the event, dispatch to the sync engine

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::AppError;
use crate::events::{LinearEvent, TwentyEvent};
use crate::{signature, AppState};
use dealbridge_sync::SyncOutcome;

/// POST /webhooks/twenty
pub async fn twenty_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    signature::verify_twenty(&headers, &body, &state.twenty_webhook_secret)?;

    let event = TwentyEvent::parse(&body)?;
    let outcome = match event {
        TwentyEvent::OpportunityUpdated {
            opportunity,
            updated_fields,
        } => {
            info!(
                "Twenty webhook received: opportunity.updated for {}",
                opportunity.id
            );
            state
                .engine
                .handle_opportunity_update(&opportunity, &updated_fields)
                .await?
        }
        TwentyEvent::NoteCreated {
            opportunity_id,
            body,
        } => {
            info!("Twenty webhook received: note.created for {}", opportunity_id);
            state.engine.handle_note_created(&opportunity_id, &body).await?
        }
        TwentyEvent::AttachmentCreated {
            opportunity_id,
            url,
            name,
        } => {
            info!(
                "Twenty webhook received: attachment.created for {}",
                opportunity_id
            );
            state
                .engine
                .handle_crm_attachment_created(&opportunity_id, &url, &name)
                .await?
        }
        TwentyEvent::Ignored => {
            debug!("Twenty webhook received: unhandled event");
            SyncOutcome::NoOp("Webhook received, no action needed")
        }
    };

    Ok(Json(outcome_body(outcome)))
}

/// POST /webhooks/linear
pub async fn linear_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    signature::verify_linear(&headers, &body, &state.linear_webhook_secret)?;

    let event = LinearEvent::parse(&body)?;
    let outcome = match event {
        LinearEvent::ProjectUpdated { project_id } => {
            info!("Linear webhook received: update Project {}", project_id);
            state.engine.handle_project_update(&project_id).await?
        }
        LinearEvent::IssueUpdated { project_id } => match project_id {
            Some(project_id) => {
                info!("Linear webhook received: update Issue in {}", project_id);
                state.engine.handle_issue_update(&project_id).await?
            }
            None => SyncOutcome::NoOp("No linked project found"),
        },
        LinearEvent::MilestoneUpdated { project_id } => match project_id {
            Some(project_id) => {
                info!(
                    "Linear webhook received: update ProjectMilestone in {}",
                    project_id
                );
                state.engine.handle_milestone_update(&project_id).await?
            }
            None => SyncOutcome::NoOp("No linked project found"),
        },
        LinearEvent::CommentCreated {
            project_id,
            issue_id,
            body,
        } => {
            info!("Linear webhook received: create Comment");
            state
                .engine
                .handle_comment_created(project_id.as_deref(), issue_id.as_deref(), &body)
                .await?
        }
        LinearEvent::AttachmentCreated {
            project_id,
            issue_id,
            url,
            title,
        } => {
            info!("Linear webhook received: create Attachment");
            state
                .engine
                .handle_attachment_created(
                    project_id.as_deref(),
                    issue_id.as_deref(),
                    &url,
                    title.as_deref(),
                )
                .await?
        }
        LinearEvent::Ignored => {
            debug!("Linear webhook received: unhandled event");
            SyncOutcome::NoOp("Webhook processed")
        }
    };

    Ok(Json(outcome_body(outcome)))
}

fn outcome_body(outcome: SyncOutcome) -> Value {
    match outcome {
        SyncOutcome::Created { project_id, url } => json!({
            "message": "Project created successfully",
            "projectId": project_id,
            "url": url,
        }),
        SyncOutcome::Synced(message) | SyncOutcome::NoOp(message) => {
            json!({ "message": message })
        }
    }
}

// ABOUTME: Inbound webhook payload parsing into typed events
// ABOUTME: Unknown event names and object types fall through to Ignored, never errors

use dealbridge_core::Opportunity;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Malformed webhook payload: {0}")]
    Malformed(String),
    #[error("Missing record data")]
    MissingRecord,
}

/// A parsed Twenty webhook event.
#[derive(Debug)]
pub enum TwentyEvent {
    OpportunityUpdated {
        opportunity: Box<Opportunity>,
        updated_fields: Vec<String>,
    },
    NoteCreated {
        opportunity_id: String,
        body: String,
    },
    AttachmentCreated {
        opportunity_id: String,
        url: String,
        name: String,
    },
    /// Event name this service does not act on.
    Ignored,
}

#[derive(Deserialize)]
struct TwentyEnvelope {
    #[serde(rename = "eventName")]
    event_name: String,
    record: Option<Value>,
    #[serde(default, rename = "updatedFields")]
    updated_fields: Vec<String>,
}

impl TwentyEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, EventError> {
        let envelope: TwentyEnvelope =
            serde_json::from_slice(payload).map_err(|e| EventError::Malformed(e.to_string()))?;

        let record = envelope.record.ok_or(EventError::MissingRecord)?;
        if record.get("id").and_then(Value::as_str).is_none() {
            return Err(EventError::MissingRecord);
        }

        match envelope.event_name.as_str() {
            "opportunity.updated" => {
                let opportunity: Opportunity = serde_json::from_value(record)
                    .map_err(|e| EventError::Malformed(e.to_string()))?;
                Ok(TwentyEvent::OpportunityUpdated {
                    opportunity: Box::new(opportunity),
                    updated_fields: envelope.updated_fields,
                })
            }
            "note.created" => {
                let Some(opportunity_id) = record_str(&record, "opportunityId") else {
                    return Ok(TwentyEvent::Ignored);
                };
                // Twenty has shipped the note text under both keys
                let body = record_str(&record, "content")
                    .or_else(|| record_str(&record, "body"))
                    .unwrap_or_default();
                Ok(TwentyEvent::NoteCreated {
                    opportunity_id,
                    body,
                })
            }
            "attachment.created" => {
                let Some(opportunity_id) = record_str(&record, "opportunityId") else {
                    return Ok(TwentyEvent::Ignored);
                };
                let Some(url) =
                    record_str(&record, "fullPath").or_else(|| record_str(&record, "url"))
                else {
                    return Ok(TwentyEvent::Ignored);
                };
                let name = record_str(&record, "name").unwrap_or_else(|| "Attachment".to_string());
                Ok(TwentyEvent::AttachmentCreated {
                    opportunity_id,
                    url,
                    name,
                })
            }
            _ => Ok(TwentyEvent::Ignored),
        }
    }
}

/// A parsed Linear webhook event.
#[derive(Debug)]
pub enum LinearEvent {
    ProjectUpdated {
        project_id: String,
    },
    IssueUpdated {
        project_id: Option<String>,
    },
    MilestoneUpdated {
        project_id: Option<String>,
    },
    CommentCreated {
        project_id: Option<String>,
        issue_id: Option<String>,
        body: String,
    },
    AttachmentCreated {
        project_id: Option<String>,
        issue_id: Option<String>,
        url: String,
        title: Option<String>,
    },
    Ignored,
}

#[derive(Deserialize)]
struct LinearEnvelope {
    action: Option<String>,
    #[serde(rename = "type")]
    object_type: Option<String>,
    data: Option<Value>,
}

impl LinearEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, EventError> {
        let envelope: LinearEnvelope =
            serde_json::from_slice(payload).map_err(|e| EventError::Malformed(e.to_string()))?;

        let (Some(action), Some(object_type), Some(data)) =
            (envelope.action, envelope.object_type, envelope.data)
        else {
            return Err(EventError::MissingRecord);
        };

        match (action.as_str(), object_type.as_str()) {
            ("update", "Project") => {
                let Some(project_id) = record_str(&data, "id") else {
                    return Err(EventError::MissingRecord);
                };
                Ok(LinearEvent::ProjectUpdated { project_id })
            }
            ("update", "Issue") => Ok(LinearEvent::IssueUpdated {
                project_id: record_str(&data, "projectId"),
            }),
            ("update", "ProjectMilestone") => Ok(LinearEvent::MilestoneUpdated {
                project_id: record_str(&data, "projectId"),
            }),
            ("create", "Comment") => Ok(LinearEvent::CommentCreated {
                project_id: record_str(&data, "projectId"),
                issue_id: record_str(&data, "issueId"),
                body: record_str(&data, "body").unwrap_or_default(),
            }),
            ("create", "Attachment") => {
                let Some(url) = record_str(&data, "url") else {
                    return Ok(LinearEvent::Ignored);
                };
                Ok(LinearEvent::AttachmentCreated {
                    project_id: record_str(&data, "projectId"),
                    issue_id: record_str(&data, "issueId"),
                    url,
                    title: record_str(&data, "title"),
                })
            }
            _ => Ok(LinearEvent::Ignored),
        }
    }
}

fn record_str(record: &Value, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

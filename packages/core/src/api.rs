// ABOUTME: Outbound API port traits for the two external systems
// ABOUTME: Implemented by the reqwest clients; mocked by the sync engine tests

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{
    Issue, Opportunity, OpportunityUpdate, Person, Project, ProjectCreate, ProjectUpdate,
    TrackerUser,
};

/// Twenty CRM REST errors
#[derive(Error, Debug)]
pub enum TwentyError {
    #[error("Twenty API request failed: {0}")]
    Network(String),
    #[error("Twenty API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Invalid Twenty API response: {0}")]
    InvalidResponse(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Linear GraphQL errors
#[derive(Error, Debug)]
pub enum LinearError {
    #[error("Linear API request failed: {0}")]
    Network(String),
    #[error("Linear API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Linear GraphQL errors: {0}")]
    GraphQl(String),
    #[error("Invalid Linear API response: {0}")]
    InvalidResponse(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Narrow contract over the Twenty CRM REST API.
#[async_trait]
pub trait TwentyApi: Send + Sync {
    async fn get_opportunity(&self, id: &str) -> Result<Opportunity, TwentyError>;

    /// Writes are restricted to the client's explicit field allow-list.
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

/// Narrow contract over the Linear GraphQL API.
#[async_trait]
pub trait LinearApi: Send + Sync {
    async fn create_project(&self, input: &ProjectCreate) -> Result<Project, LinearError>;

    async fn update_project(&self, id: &str, update: &ProjectUpdate) -> Result<(), LinearError>;

    async fn get_project(&self, id: &str) -> Result<Project, LinearError>;

    async fn get_issue(&self, id: &str) -> Result<Issue, LinearError>;

    async fn get_project_issues(&self, project_id: &str) -> Result<Vec<Issue>, LinearError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<TrackerUser>, LinearError>;

    async fn create_comment(&self, project_id: &str, body: &str) -> Result<(), LinearError>;
}

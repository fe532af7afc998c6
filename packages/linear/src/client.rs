// ABOUTME: GraphQL client for the Linear API
// ABOUTME: Projects, issues, users, and comments over reqwest with Bearer-less key auth

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use dealbridge_core::{
    Issue, LinearApi, LinearError, Project, ProjectCreate, ProjectUpdate, TrackerUser,
};

const LINEAR_API_URL: &str = "https://api.linear.app/graphql";

/// Client for the Linear GraphQL API. All calls target a single endpoint;
/// the configured team id scopes project creation.
#[derive(Clone)]
pub struct LinearClient {
    http_client: Client,
    api_url: String,
    api_key: String,
    team_id: String,
}

impl LinearClient {
    pub fn new(api_key: &str, team_id: &str) -> Result<Self, LinearError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LinearError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url: LINEAR_API_URL.to_string(),
            api_key: api_key.to_string(),
            team_id: team_id.to_string(),
        })
    }

    async fn graphql<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, LinearError> {
        let body = json!({ "query": query, "variables": variables });
        let response = self
            .http_client
            .post(&self.api_url)
            .header("Authorization", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LinearError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LinearError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| LinearError::InvalidResponse(e.to_string()))?;

        if let Some(errors) = payload.get("errors") {
            if !errors.is_null() {
                return Err(LinearError::GraphQl(errors.to_string()));
            }
        }

        let data = payload
            .get("data")
            .ok_or_else(|| LinearError::InvalidResponse("missing 'data' in response".into()))?;

        serde_json::from_value(data.clone())
            .map_err(|e| LinearError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl LinearApi for LinearClient {
    async fn create_project(&self, input: &ProjectCreate) -> Result<Project, LinearError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct CreateResponse {
            project_create: MutationResult,
        }

        info!(
            "Creating Linear project \"{}\" (lead: {}, target date: {})",
            input.name,
            input.lead_id.is_some(),
            input.target_date.as_deref().unwrap_or("none"),
        );

        let mutation = r#"
            mutation ProjectCreate($input: ProjectCreateInput!) {
                projectCreate(input: $input) {
                    success
                    project {
                        id name description state progress targetDate url
                        lead { id email name }
                    }
                }
            }
        "#;

        let variables = json!({ "input": project_create_input(input, &self.team_id) });
        let response: CreateResponse = self.graphql(mutation, variables).await?;

        if !response.project_create.success {
            return Err(LinearError::InvalidResponse(
                "project creation was not successful".into(),
            ));
        }
        response
            .project_create
            .project
            .ok_or_else(|| LinearError::InvalidResponse("projectCreate returned no project".into()))
    }

    async fn update_project(&self, id: &str, update: &ProjectUpdate) -> Result<(), LinearError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct UpdateResponse {
            project_update: MutationResult,
        }

        if update.is_empty() {
            debug!("No project fields to update for {}", id);
            return Ok(());
        }

        info!("Updating Linear project {}", id);

        let mutation = r#"
            mutation ProjectUpdate($id: String!, $input: ProjectUpdateInput!) {
                projectUpdate(id: $id, input: $input) {
                    success
                    project { id }
                }
            }
        "#;

        let variables = json!({ "id": id, "input": project_update_input(update) });
        let response: UpdateResponse = self.graphql(mutation, variables).await?;

        if !response.project_update.success {
            return Err(LinearError::InvalidResponse(
                "project update was not successful".into(),
            ));
        }
        Ok(())
    }

    async fn get_project(&self, id: &str) -> Result<Project, LinearError> {
        #[derive(Deserialize)]
        struct ProjectResponse {
            project: Option<Project>,
        }

        debug!("Fetching Linear project {}", id);

        let query = r#"
            query Project($id: String!) {
                project(id: $id) {
                    id name description state progress targetDate url
                    lead { id email name }
                }
            }
        "#;

        let response: ProjectResponse = self.graphql(query, json!({ "id": id })).await?;
        response
            .project
            .ok_or_else(|| LinearError::NotFound(format!("project {id}")))
    }

    async fn get_issue(&self, id: &str) -> Result<Issue, LinearError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct IssueNode {
            id: String,
            title: Option<String>,
            completed_at: Option<String>,
            project: Option<ProjectRef>,
        }
        #[derive(Deserialize)]
        struct ProjectRef {
            id: String,
        }
        #[derive(Deserialize)]
        struct IssueResponse {
            issue: Option<IssueNode>,
        }

        debug!("Fetching Linear issue {}", id);

        let query = r#"
            query Issue($id: String!) {
                issue(id: $id) {
                    id title completedAt
                    project { id }
                }
            }
        "#;

        let response: IssueResponse = self.graphql(query, json!({ "id": id })).await?;
        let node = response
            .issue
            .ok_or_else(|| LinearError::NotFound(format!("issue {id}")))?;

        Ok(Issue {
            id: node.id,
            title: node.title,
            completed_at: node.completed_at,
            project_id: node.project.map(|p| p.id),
        })
    }

    async fn get_project_issues(&self, project_id: &str) -> Result<Vec<Issue>, LinearError> {
        #[derive(Deserialize)]
        struct IssuesResponse {
            issues: IssueConnection,
        }
        #[derive(Deserialize)]
        struct IssueConnection {
            nodes: Vec<Issue>,
        }

        debug!("Fetching issues for Linear project {}", project_id);

        let query = r#"
            query Issues($filter: IssueFilter!) {
                issues(filter: $filter) {
                    nodes { id title completedAt }
                }
            }
        "#;

        let variables = json!({
            "filter": { "project": { "id": { "eq": project_id } } }
        });
        let response: IssuesResponse = self.graphql(query, variables).await?;
        Ok(response.issues.nodes)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<TrackerUser>, LinearError> {
        #[derive(Deserialize)]
        struct UsersResponse {
            users: UserConnection,
        }
        #[derive(Deserialize)]
        struct UserConnection {
            nodes: Vec<UserNode>,
        }
        #[derive(Deserialize)]
        struct UserNode {
            id: String,
            email: Option<String>,
            name: Option<String>,
            active: Option<bool>,
        }

        debug!("Looking up Linear user by email: {}", email);

        let query = r#"
            query Users($filter: UserFilter) {
                users(filter: $filter) {
                    nodes { id email name active }
                }
            }
        "#;

        let variables = json!({ "filter": { "email": { "eq": email } } });
        let response: UsersResponse = self.graphql(query, variables).await?;

        let user = response
            .users
            .nodes
            .into_iter()
            .filter(|u| u.active.unwrap_or(false))
            .find(|u| {
                u.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            });

        match user {
            Some(node) => Ok(Some(TrackerUser {
                id: node.id,
                email: node.email,
                name: node.name,
            })),
            None => {
                warn!("No active Linear user found for email: {}", email);
                Ok(None)
            }
        }
    }

    async fn create_comment(&self, project_id: &str, body: &str) -> Result<(), LinearError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct CommentResponse {
            comment_create: MutationResult,
        }

        info!("Creating comment on Linear project {}", project_id);

        let mutation = r#"
            mutation CommentCreate($input: CommentCreateInput!) {
                commentCreate(input: $input) {
                    success
                    comment { id }
                }
            }
        "#;

        let variables = json!({ "input": { "projectId": project_id, "body": body } });
        let response: CommentResponse = self.graphql(mutation, variables).await?;

        if !response.comment_create.success {
            return Err(LinearError::InvalidResponse(
                "comment creation was not successful".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct MutationResult {
    success: bool,
    #[serde(default)]
    project: Option<Project>,
}

/// Build the ProjectCreateInput object, omitting optional fields entirely
/// rather than sending nulls.
fn project_create_input(input: &ProjectCreate, team_id: &str) -> Value {
    let mut object = Map::new();
    object.insert("teamIds".into(), json!([team_id]));
    object.insert("name".into(), json!(input.name));
    object.insert("description".into(), json!(input.description));
    if let Some(lead_id) = &input.lead_id {
        object.insert("leadId".into(), json!(lead_id));
    }
    if let Some(target_date) = &input.target_date {
        object.insert("targetDate".into(), json!(target_date));
    }
    Value::Object(object)
}

fn project_update_input(update: &ProjectUpdate) -> Value {
    let mut object = Map::new();
    if let Some(name) = &update.name {
        object.insert("name".into(), json!(name));
    }
    if let Some(state) = &update.state {
        object.insert("state".into(), json!(state));
    }
    if let Some(target_date) = &update.target_date {
        object.insert("targetDate".into(), json!(target_date));
    }
    if let Some(lead_id) = &update.lead_id {
        object.insert("leadId".into(), json!(lead_id));
    }
    Value::Object(object)
}

// ABOUTME: reqwest client for the Twenty CRM REST API
// ABOUTME: Opportunities, people, notes, and attachments with allow-listed writes

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use dealbridge_core::{
    progress_to_percent, Opportunity, OpportunityUpdate, Person, TwentyApi, TwentyError,
};

/// Field names Twenty accepts on an opportunity PATCH. Anything outside this
/// list is dropped before the request so a stray key can never fail the call.
const ALLOWED_UPDATE_FIELDS: &[&str] = &[
    "name",
    "closeDate",
    "pointOfContactId",
    "linearprojectid",
    "projectprogress",
    "deliverystatus",
    "syncstatus",
];

/// Client for the Twenty CRM REST API.
#[derive(Clone)]
pub struct TwentyClient {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl TwentyClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, TwentyError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TwentyError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    async fn read_body<T: DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T, TwentyError> {
        match response.status() {
            StatusCode::OK | StatusCode::CREATED => response
                .json::<T>()
                .await
                .map_err(|e| TwentyError::InvalidResponse(e.to_string())),
            StatusCode::NOT_FOUND => Err(TwentyError::NotFound(what.to_string())),
            status => {
                let body = response.text().await.unwrap_or_else(|_| status.to_string());
                Err(TwentyError::Api {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl TwentyApi for TwentyClient {
    async fn get_opportunity(&self, id: &str) -> Result<Opportunity, TwentyError> {
        debug!("Fetching opportunity from Twenty: {}", id);

        let response = self
            .http_client
            .get(self.url(&format!("/rest/opportunities/{id}")))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| TwentyError::Network(e.to_string()))?;

        let body: Value = Self::read_body(response, &format!("opportunity {id}")).await?;
        let record = unwrap_record(&body, "opportunity");
        serde_json::from_value(record).map_err(|e| TwentyError::InvalidResponse(e.to_string()))
    }

    async fn update_opportunity(
        &self,
        id: &str,
        update: &OpportunityUpdate,
    ) -> Result<(), TwentyError> {
        let payload = update_payload(update);
        if payload.is_empty() {
            debug!("No allow-listed fields to update for opportunity {}", id);
            return Ok(());
        }

        info!("Updating Twenty opportunity {}: {:?}", id, payload.keys());

        let response = self
            .http_client
            .patch(self.url(&format!("/rest/opportunities/{id}")))
            .header("Authorization", self.auth_header())
            .json(&Value::Object(payload))
            .send()
            .await
            .map_err(|e| TwentyError::Network(e.to_string()))?;

        Self::read_body::<Value>(response, &format!("opportunity {id}")).await?;
        Ok(())
    }

    async fn get_person(&self, id: &str) -> Result<Person, TwentyError> {
        debug!("Fetching person from Twenty: {}", id);

        let response = self
            .http_client
            .get(self.url(&format!("/rest/people/{id}")))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| TwentyError::Network(e.to_string()))?;

        let body: Value = Self::read_body(response, &format!("person {id}")).await?;
        let record = unwrap_record(&body, "person");
        person_from_record(&record).ok_or_else(|| {
            TwentyError::InvalidResponse(format!("person {id} record has no id field"))
        })
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<Person>, TwentyError> {
        debug!("Searching Twenty people by email: {}", email);

        let filter = json!({ "email": { "eq": email } }).to_string();
        let response = self
            .http_client
            .get(self.url("/rest/people"))
            .header("Authorization", self.auth_header())
            .query(&[("filter", filter.as_str())])
            .send()
            .await
            .map_err(|e| TwentyError::Network(e.to_string()))?;

        let body: Value = Self::read_body(response, "people search").await?;
        let people = body
            .pointer("/data/people")
            .or_else(|| body.get("data"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        match people.first().and_then(person_from_record) {
            Some(person) => Ok(Some(person)),
            None => {
                warn!("No Twenty user found for email: {}", email);
                Ok(None)
            }
        }
    }

    async fn create_note(&self, opportunity_id: &str, body: &str) -> Result<(), TwentyError> {
        info!("Creating note in Twenty for opportunity {}", opportunity_id);

        let response = self
            .http_client
            .post(self.url("/rest/notes"))
            .header("Authorization", self.auth_header())
            .json(&json!({
                "opportunityId": opportunity_id,
                "title": "Note from Linear",
                "body": body,
            }))
            .send()
            .await
            .map_err(|e| TwentyError::Network(e.to_string()))?;

        Self::read_body::<Value>(response, "note").await?;
        Ok(())
    }

    async fn create_attachment(
        &self,
        opportunity_id: &str,
        url: &str,
        name: &str,
    ) -> Result<(), TwentyError> {
        info!(
            "Creating attachment in Twenty for opportunity {}",
            opportunity_id
        );

        let response = self
            .http_client
            .post(self.url("/rest/attachments"))
            .header("Authorization", self.auth_header())
            .json(&json!({
                "opportunityId": opportunity_id,
                "externalUrl": url,
                "name": name,
            }))
            .send()
            .await
            .map_err(|e| TwentyError::Network(e.to_string()))?;

        Self::read_body::<Value>(response, "attachment").await?;
        Ok(())
    }
}

/// Twenty wraps single records as `{"data": {"<kind>": {...}}}`; older
/// deployments return the record bare. Accept both.
fn unwrap_record(body: &Value, kind: &str) -> Value {
    body.pointer(&format!("/data/{kind}"))
        .cloned()
        .unwrap_or_else(|| body.clone())
}

/// Pull an id and a primary email out of a person record. Twenty has shipped
/// the email as `emails.primaryEmail`, a bare `email` string, and an array of
/// `{email}` objects; probe all three.
fn person_from_record(record: &Value) -> Option<Person> {
    let id = record.get("id")?.as_str()?.to_string();

    let email = record
        .pointer("/emails/primaryEmail")
        .and_then(Value::as_str)
        .or_else(|| record.get("email").and_then(Value::as_str))
        .or_else(|| {
            record
                .get("email")
                .and_then(Value::as_array)
                .and_then(|entries| entries.first())
                .and_then(|entry| entry.get("email"))
                .and_then(Value::as_str)
        })
        .filter(|e| !e.is_empty())
        .map(String::from);

    Some(Person { id, email })
}

/// Build the PATCH body: rename to Twenty's field names, convert the
/// canonical progress fraction to a percentage integer, then drop anything
/// outside the allow-list.
fn update_payload(update: &OpportunityUpdate) -> Map<String, Value> {
    let mut payload = Map::new();

    if let Some(name) = &update.name {
        payload.insert("name".into(), json!(name));
    }
    if let Some(close_date) = &update.close_date {
        payload.insert("closeDate".into(), json!(close_date));
    }
    if let Some(contact_id) = &update.point_of_contact_id {
        payload.insert("pointOfContactId".into(), json!(contact_id));
    }
    if let Some(project_id) = &update.linear_project_id {
        payload.insert("linearprojectid".into(), json!(project_id));
    }
    if let Some(fraction) = update.project_progress {
        payload.insert("projectprogress".into(), json!(progress_to_percent(fraction)));
    }
    if let Some(status) = update.delivery_status {
        payload.insert("deliverystatus".into(), json!(status));
    }
    if let Some(status) = update.sync_status {
        payload.insert("syncstatus".into(), json!(status));
    }

    payload.retain(|key, _| ALLOWED_UPDATE_FIELDS.contains(&key.as_str()));
    payload
}

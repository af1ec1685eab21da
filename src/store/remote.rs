//! Gateway to the registration service.
//!
//! The `RemoteStageStore` trait is the seam the controller depends on;
//! `HttpStageStore` is the production implementation over reqwest. Neither
//! retries: every call is attempted once and the caller decides what a
//! failure means.

use std::collections::BTreeMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};

use crate::config::SessionConfig;
use crate::error::RemoteError;
use crate::stages::ActorType;

/// Raw field values for one stage, keyed by field name.
pub type StageData = Map<String, Value>;

/// Aggregate registration record returned by the profile endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationProfile {
    pub current_step: Option<u32>,
    pub completed_steps: Vec<u32>,
    pub status: Option<String>,
    pub is_registration_complete: bool,
    /// Per-stage data, from the `stage{N}` keys.
    pub stages: BTreeMap<u32, StageData>,
}

impl RegistrationProfile {
    /// Parse a profile body, unwrapping a `{"data": ...}` envelope if present.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let Value::Object(body) = unwrap_envelope(value) else {
            return Err("profile body is not an object".to_string());
        };

        let mut profile = Self {
            current_step: body.get("currentStep").and_then(as_step),
            completed_steps: body
                .get("completedSteps")
                .and_then(Value::as_array)
                .map(|steps| steps.iter().filter_map(as_step).collect())
                .unwrap_or_default(),
            status: body
                .get("status")
                .and_then(Value::as_str)
                .map(str::to_string),
            is_registration_complete: body
                .get("isRegistrationComplete")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            stages: BTreeMap::new(),
        };

        for (key, value) in body {
            let Some(n) = key.strip_prefix("stage").and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            if let Value::Object(data) = value {
                profile.stages.insert(n, data);
            }
        }

        Ok(profile)
    }
}

/// Optional registration flags the service may echo back on a stage write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageAck {
    pub current_step: Option<u32>,
    pub completed_steps: Option<Vec<u32>>,
    pub status: Option<String>,
    pub is_registration_complete: Option<bool>,
}

impl StageAck {
    /// Lenient parse: anything that is not an object yields an empty ack.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(body) = unwrap_envelope(value) else {
            return Self::default();
        };
        Self {
            current_step: body.get("currentStep").and_then(as_step),
            completed_steps: body
                .get("completedSteps")
                .and_then(Value::as_array)
                .map(|steps| steps.iter().filter_map(as_step).collect()),
            status: body
                .get("status")
                .and_then(Value::as_str)
                .map(str::to_string),
            is_registration_complete: body.get("isRegistrationComplete").and_then(Value::as_bool),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut body) if body.len() == 1 && body.get("data").is_some_and(Value::is_object) => {
            body.remove("data").unwrap_or_default()
        }
        other => other,
    }
}

/// Step numbers arrive as numbers or numeric strings depending on the backend.
fn as_step(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads and writes stage data on the registration service.
#[async_trait]
pub trait RemoteStageStore: Send + Sync {
    /// Fetch the aggregate registration record used at initialization.
    async fn fetch_profile(&self, actor: ActorType) -> Result<RegistrationProfile, RemoteError>;

    /// Fetch the raw data of a single stage.
    async fn fetch_stage(&self, actor: ActorType, stage: u32) -> Result<StageData, RemoteError>;

    /// Replace the stored data of a single stage.
    async fn persist_stage(
        &self,
        actor: ActorType,
        stage: u32,
        data: &StageData,
    ) -> Result<StageAck, RemoteError>;
}

/// `RemoteStageStore` over HTTP.
pub struct HttpStageStore {
    base_url: String,
    token: Option<SecretString>,
    client: reqwest::Client,
    request_timeout: std::time::Duration,
}

impl HttpStageStore {
    pub fn new(config: &SessionConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RemoteError::Unavailable(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
            client,
            request_timeout: config.request_timeout,
        })
    }

    fn profile_url(&self, actor: ActorType) -> String {
        format!("{}/{}/profile", self.base_url, actor.collection())
    }

    fn stage_url(&self, actor: ActorType, stage: u32) -> String {
        format!("{}/{}/stage/{stage}", self.base_url, actor.collection())
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    /// Send a request and return the decoded JSON body (`Null` for an empty body).
    async fn send(&self, url: &str, request: reqwest::RequestBuilder) -> Result<Value, RemoteError> {
        let resp = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.transport_error(url, e))?;

        if !status.is_success() {
            return Err(RemoteError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| RemoteError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> RemoteError {
        if e.is_timeout() {
            RemoteError::Timeout {
                url: url.to_string(),
                timeout: self.request_timeout,
            }
        } else {
            RemoteError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl RemoteStageStore for HttpStageStore {
    async fn fetch_profile(&self, actor: ActorType) -> Result<RegistrationProfile, RemoteError> {
        let url = self.profile_url(actor);
        let body = self.send(&url, self.client.get(&url)).await?;
        RegistrationProfile::from_value(body).map_err(|reason| RemoteError::Decode { url, reason })
    }

    async fn fetch_stage(&self, actor: ActorType, stage: u32) -> Result<StageData, RemoteError> {
        let url = self.stage_url(actor, stage);
        match unwrap_envelope(self.send(&url, self.client.get(&url)).await?) {
            Value::Object(data) => Ok(data),
            Value::Null => Ok(StageData::new()),
            _ => Err(RemoteError::Decode {
                url,
                reason: "stage body is not an object".to_string(),
            }),
        }
    }

    async fn persist_stage(
        &self,
        actor: ActorType,
        stage: u32,
        data: &StageData,
    ) -> Result<StageAck, RemoteError> {
        let url = self.stage_url(actor, stage);
        let body = self.send(&url, self.client.put(&url).json(data)).await?;
        Ok(StageAck::from_value(body))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn profile_parses_flags_and_stage_keys() {
        let profile = RegistrationProfile::from_value(json!({
            "currentStep": 3,
            "completedSteps": [1, "2"],
            "status": "in_progress",
            "isRegistrationComplete": false,
            "stage1": {"firstName": "Ada"},
            "stage2": {"vehicleType": "car"},
            "stageNotes": {"ignored": true},
            "stage3": null
        }))
        .unwrap();

        assert_eq!(profile.current_step, Some(3));
        assert_eq!(profile.completed_steps, vec![1, 2]);
        assert_eq!(profile.status.as_deref(), Some("in_progress"));
        assert!(!profile.is_registration_complete);
        assert_eq!(profile.stages.len(), 2);
        assert_eq!(profile.stages[&1]["firstName"], "Ada");
    }

    #[test]
    fn profile_unwraps_data_envelope() {
        let profile = RegistrationProfile::from_value(json!({
            "data": {"currentStep": "2", "stage1": {"a": 1}}
        }))
        .unwrap();
        assert_eq!(profile.current_step, Some(2));
        assert!(profile.stages.contains_key(&1));
    }

    #[test]
    fn profile_rejects_non_object() {
        assert!(RegistrationProfile::from_value(json!([1, 2])).is_err());
        assert!(RegistrationProfile::from_value(Value::Null).is_err());
    }

    #[test]
    fn ack_is_lenient() {
        assert!(StageAck::from_value(Value::Null).is_empty());
        assert!(StageAck::from_value(json!({"ok": true})).is_empty());

        let ack = StageAck::from_value(json!({
            "isRegistrationComplete": true,
            "completedSteps": [1, 2, 3, 4, 5],
            "status": "pending_review"
        }));
        assert_eq!(ack.is_registration_complete, Some(true));
        assert_eq!(ack.completed_steps.as_deref(), Some(&[1, 2, 3, 4, 5][..]));
        assert!(ack.current_step.is_none());
    }

    #[test]
    fn urls_follow_collection_layout() {
        let config = SessionConfig {
            api_base_url: "http://svc/api/".to_string(),
            ..Default::default()
        };
        let store = HttpStageStore::new(&config).unwrap();
        assert_eq!(
            store.profile_url(ActorType::Driver),
            "http://svc/api/drivers-staged/profile"
        );
        assert_eq!(
            store.stage_url(ActorType::Restaurant, 4),
            "http://svc/api/restaurants-staged/stage/4"
        );
    }
}

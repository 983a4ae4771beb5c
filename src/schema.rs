use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

// Request body for creating a new todo
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTodoSchema {
    pub description: String,
    #[serde(default = "default_active", deserialize_with = "active_flag")]
    pub active: i64,
}

// Request body for editing an active todo; absent fields keep their value
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateTodoSchema {
    pub todo_id: i64,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "optional_active_flag")]
    pub active: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteTodoSchema {
    pub todo_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginSchema {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSchema {
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUploadResponse {
    pub url: String,
    pub method: String,
    pub expires_in: u64,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    #[serde(rename = "HEALTH_CHECK")]
    pub health_check: String,
}

fn default_active() -> i64 {
    1
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Number(i64),
}

impl From<RawFlag> for i64 {
    fn from(raw: RawFlag) -> Self {
        match raw {
            RawFlag::Bool(flag) => i64::from(flag),
            RawFlag::Number(number) => number,
        }
    }
}

// `active` arrives as 0/1 or true/false.
fn active_flag<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    RawFlag::deserialize(deserializer).map(i64::from)
}

fn optional_active_flag<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawFlag>::deserialize(deserializer).map(|raw| raw.map(i64::from))
}

// Local user ids are integers, Cognito ids are UUID strings; clients send either.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

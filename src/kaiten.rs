use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::env_utils::KaitenConfig;
use crate::tilda::InboundForm;
use crate::utils::json_value_to_text;

pub const CARD_TITLE: &str = "New submission from Tilda form";

// Stands in for a uid the Kaiten response did not include.
const MISSING_UID: &str = "None";

#[derive(Debug, thiserror::Error)]
pub enum KaitenError {
    #[error("request to Kaiten timed out")]
    Timeout,

    #[error("could not reach Kaiten: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Kaiten responded with {status}")]
    Status { status: StatusCode, body: String },

    #[error("could not decode Kaiten response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for KaitenError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            KaitenError::Timeout
        } else {
            KaitenError::Transport(err)
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OutboundCard {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub type_field: String,
    pub status: String,
    pub board_id: String,
}

impl OutboundCard {
    pub fn from_form(form: &InboundForm, board_id: &str) -> Self {
        Self {
            title: CARD_TITLE.to_string(),
            description: form.description(),
            type_field: "task".to_string(),
            status: "new".to_string(),
            board_id: board_id.to_string(),
        }
    }
}

/// The parts of Kaiten's card payload this service cares about. Everything
/// else in the response is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownstreamResponse {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uid: Option<Value>,
}

impl DownstreamResponse {
    pub fn card_url(&self, api_url: &str) -> String {
        let uid = match &self.uid {
            Some(uid) if !uid.is_null() => json_value_to_text(uid),
            _ => {
                tracing::warn!("Kaiten response for card {} has no uid", self.id);
                MISSING_UID.to_string()
            }
        };

        match url::Url::parse(api_url) {
            Ok(mut url) => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().push("c").push(&uid);
                }
                url.to_string()
            }
            Err(_) => format!("{api_url}/c/{uid}"),
        }
    }
}

#[async_trait]
pub trait CardCreator: Send + Sync {
    async fn create_card(&self, card: &OutboundCard) -> Result<DownstreamResponse, KaitenError>;
}

pub struct KaitenClient {
    client: reqwest::Client,
    api_url: String,
    api_token: String,
}

impl KaitenClient {
    pub fn new(config: &KaitenConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Kaiten HTTP client")?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_token: config.api_token.clone(),
        })
    }
}

#[async_trait]
impl CardCreator for KaitenClient {
    async fn create_card(&self, card: &OutboundCard) -> Result<DownstreamResponse, KaitenError> {
        let url = format!("{}/api/v1/cards", self.api_url);

        let resp = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_token))
            .json(card)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or("Unknown error".to_string());
            tracing::debug!("Kaiten error body: {}", body);
            return Err(KaitenError::Status { status, body });
        }

        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| KaitenError::Decode(e.to_string()))
    }
}

//! Centrifugo HTTP API client used to fan out committed odds changes.

use crate::config::BrokerConfig;
use crate::error::PublishError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const COEFFICIENT_UPDATE: &str = "coefficient_update";

/// Payload published for every committed coefficient change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientUpdateMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub market_id: i64,
    pub event_id: i64,
    pub old_coefficient: f64,
    pub new_coefficient: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
}

impl CoefficientUpdateMessage {
    pub fn new(event_id: i64, market_id: i64, old_coefficient: f64, new_coefficient: f64) -> Self {
        Self {
            kind: COEFFICIENT_UPDATE.to_string(),
            market_id,
            event_id,
            old_coefficient,
            new_coefficient,
            timestamp: Utc::now(),
            market_name: None,
            event_name: None,
        }
    }

    /// Attach display names; empty names are left out of the payload
    pub fn with_names(mut self, market_name: &str, event_name: &str) -> Self {
        self.market_name = Some(market_name.to_string()).filter(|s| !s.is_empty());
        self.event_name = Some(event_name.to_string()).filter(|s| !s.is_empty());
        self
    }
}

/// Delivery of committed changes to subscribers.
///
/// Implementations report failures; callers decide that they are advisory.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &CoefficientUpdateMessage) -> Result<(), PublishError>;
}

#[derive(Debug, Serialize)]
struct ApiRequest<P: Serialize> {
    method: &'static str,
    params: P,
}

#[derive(Debug, Serialize)]
struct PublishParams<'a, T: Serialize + ?Sized> {
    channel: &'a str,
    data: &'a T,
}

#[derive(Debug, Serialize)]
struct InfoParams<'a> {
    channel: &'a str,
}

/// Client for the Centrifugo server API (`POST <api_url>/api`)
#[derive(Debug, Clone)]
pub struct CentrifugoClient {
    http: Client,
    api_url: String,
    api_key: String,
    channel: String,
}

impl CentrifugoClient {
    /// Build a client; every call is bounded by `config.timeout()`
    pub fn new(config: &BrokerConfig) -> Result<Self, PublishError> {
        let http = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            channel: config.channel.clone(),
        })
    }

    /// Channel odds updates are published to
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Publish `data` to `channel`. Only HTTP 200 counts as delivered.
    pub async fn publish<T: Serialize + ?Sized>(
        &self,
        channel: &str,
        data: &T,
    ) -> Result<(), PublishError> {
        let request = ApiRequest {
            method: "publish",
            params: PublishParams { channel, data },
        };

        let response = self.call(&request).await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(PublishError::UnexpectedStatus(status.as_u16()));
        }

        Ok(())
    }

    /// Query channel presence/info from the broker
    pub async fn channel_info(&self, channel: &str) -> Result<serde_json::Value, PublishError> {
        let request = ApiRequest {
            method: "info",
            params: InfoParams { channel },
        };

        let response = self.call(&request).await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(PublishError::UnexpectedStatus(status.as_u16()));
        }

        let info = response.json::<serde_json::Value>().await?;
        info!("Channel {} info: {}", channel, info);
        Ok(info)
    }

    async fn call<P: Serialize>(&self, request: &ApiRequest<P>) -> Result<reqwest::Response, PublishError> {
        let body = serde_json::to_vec(request)?;

        let response = self
            .http
            .post(format!("{}/api", self.api_url))
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("apikey {}", self.api_key))
            .body(body)
            .send()
            .await?;

        Ok(response)
    }
}

#[async_trait]
impl Notifier for CentrifugoClient {
    async fn notify(&self, message: &CoefficientUpdateMessage) -> Result<(), PublishError> {
        match self.publish(&self.channel, message).await {
            Ok(()) => {
                info!(
                    "Published coefficient update to channel {}: market {} ({:.2} -> {:.2})",
                    self.channel, message.market_id, message.old_coefficient, message.new_coefficient
                );
                Ok(())
            }
            Err(e) => {
                warn!("Failed to publish to channel {}: {}", self.channel, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        let message = CoefficientUpdateMessage::new(2, 4, 2.1, 1.8);
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["type"], "coefficient_update");
        assert_eq!(value["market_id"], 4);
        assert_eq!(value["event_id"], 2);
        assert_eq!(value["old_coefficient"], 2.1);
        assert_eq!(value["new_coefficient"], 1.8);
        assert!(value["timestamp"].is_string());
        assert!(value.get("market_name").is_none());
        assert!(value.get("event_name").is_none());
    }

    #[test]
    fn test_message_names_skip_empty() {
        let message = CoefficientUpdateMessage::new(1, 2, 4.65, 4.9).with_names("Draw", "");
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["market_name"], "Draw");
        assert!(value.get("event_name").is_none());
    }

    #[test]
    fn test_publish_envelope() {
        let message = CoefficientUpdateMessage::new(1, 1, 1.24, 1.3);
        let request = ApiRequest {
            method: "publish",
            params: PublishParams {
                channel: "odds_updates",
                data: &message,
            },
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["method"], "publish");
        assert_eq!(value["params"]["channel"], "odds_updates");
        assert_eq!(value["params"]["data"]["type"], "coefficient_update");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let config = BrokerConfig {
            api_url: "http://localhost:8000/".to_string(),
            ..BrokerConfig::default()
        };
        let client = CentrifugoClient::new(&config).unwrap();
        assert_eq!(client.api_url, "http://localhost:8000");
        assert_eq!(client.channel(), "odds_updates");
    }
}

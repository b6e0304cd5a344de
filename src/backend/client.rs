use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::{Forecast, MetricsPatch, Node, NodeId, SimulationStatus};
use crate::error::SyncError;
use crate::ingest::{decode_forecast, decode_metrics, decode_node, decode_nodes, decode_status};
use crate::sync::{Resource, SnapshotSource};

/// Reply to a command endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CommandAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
struct StartRequest {
    num_agents: u32,
    hours: u32,
}

#[derive(Debug, Serialize)]
struct ScenarioRequest<'a> {
    scenario_type: &'a str,
    parameters: Option<Value>,
}

/// Client for the backend's REST surface
#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
    default_battery_capacity: f64,
}

impl BackendClient {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
        default_battery_capacity: f64,
    ) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|e| SyncError::Url(e.to_string()))?,
        );
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| SyncError::Url(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
            default_battery_capacity,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get(&self, resource: Resource, path: &str) -> Result<Vec<u8>, SyncError> {
        let url = self.url(path);
        debug!(%url, %resource, "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| http_error(resource, source))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus { resource, status });
        }
        let body = resp
            .bytes()
            .await
            .map_err(|source| http_error(resource, source))?;
        Ok(body.to_vec())
    }

    async fn command<B: Serialize + ?Sized>(
        &self,
        command: &'static str,
        path: &str,
        body: Option<&B>,
    ) -> Result<CommandAck, SyncError> {
        let mut req = self.client.post(self.url(path));
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await.map_err(|e| SyncError::Command {
            command,
            message: e.to_string(),
        })?;
        let status = resp.status();
        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) => {
                debug!(command, error = %e, "failed to read command response body");
                String::new()
            }
        };
        if !status.is_success() {
            return Err(SyncError::Command {
                command,
                message: format!("HTTP {status}: {}", detail(&text)),
            });
        }
        let ack = match serde_json::from_str(&text) {
            Ok(ack) => ack,
            Err(e) => {
                debug!(command, error = %e, "command acknowledgement not understood, using empty ack");
                CommandAck::default()
            }
        };
        info!(command, "command accepted");
        Ok(ack)
    }

    pub async fn start_simulation(&self, num_agents: u32, hours: u32) -> Result<CommandAck, SyncError> {
        self.command(
            "start_simulation",
            "/simulation/start",
            Some(&StartRequest { num_agents, hours }),
        )
        .await
    }

    pub async fn stop_simulation(&self) -> Result<CommandAck, SyncError> {
        self.command::<()>("stop_simulation", "/simulation/stop", None)
            .await
    }

    pub async fn run_scenario(
        &self,
        scenario_type: &str,
        parameters: Option<Value>,
    ) -> Result<CommandAck, SyncError> {
        self.command(
            "run_scenario",
            "/scenario/run",
            Some(&ScenarioRequest {
                scenario_type,
                parameters,
            }),
        )
        .await
    }

    /// One agent's current record
    pub async fn agent(&self, id: NodeId) -> Result<Node, SyncError> {
        let body = self.get(Resource::Nodes, &format!("/agents/{id}")).await?;
        decode_node(&body, self.default_battery_capacity).map_err(|source| SyncError::Decode {
            resource: Resource::Nodes,
            source,
        })
    }
}

fn http_error(resource: Resource, source: reqwest::Error) -> SyncError {
    if source.is_timeout() {
        SyncError::Timeout { resource }
    } else {
        SyncError::Http { resource, source }
    }
}

/// FastAPI-style `{"detail": ...}` bodies collapse to their message.
fn detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").map(|d| d.as_str().map_or_else(|| d.to_string(), str::to_string)))
        .unwrap_or_else(|| body.trim().to_string())
}

fn decode<T>(
    resource: Resource,
    body: &[u8],
    f: impl FnOnce(&[u8]) -> Result<T, serde_json::Error>,
) -> Result<T, SyncError> {
    f(body).map_err(|source| SyncError::Decode { resource, source })
}

#[async_trait]
impl SnapshotSource for BackendClient {
    async fn fetch_status(&self) -> Result<SimulationStatus, SyncError> {
        let body = self.get(Resource::Status, "/simulation/status").await?;
        decode(Resource::Status, &body, decode_status)
    }

    async fn fetch_nodes(&self) -> Result<Vec<Node>, SyncError> {
        let body = self.get(Resource::Nodes, "/agents").await?;
        let capacity = self.default_battery_capacity;
        decode(Resource::Nodes, &body, |b| decode_nodes(b, capacity))
    }

    async fn fetch_metrics(&self) -> Result<MetricsPatch, SyncError> {
        let body = self.get(Resource::Metrics, "/metrics/community").await?;
        decode(Resource::Metrics, &body, decode_metrics)
    }

    async fn fetch_forecast(&self) -> Result<Forecast, SyncError> {
        let body = self.get(Resource::Forecast, "/forecast/24h").await?;
        decode(Resource::Forecast, &body, decode_forecast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> BackendClient {
        BackendClient::new(base, "test-agent/1.0", Duration::from_secs(1), 10.0).unwrap()
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        assert_eq!(
            client("http://localhost:8000/").url("/agents"),
            "http://localhost:8000/api/v1/agents"
        );
        assert_eq!(
            client("http://localhost:8000").url("/forecast/24h"),
            "http://localhost:8000/api/v1/forecast/24h"
        );
    }

    #[test]
    fn test_detail_extraction() {
        assert_eq!(detail(r#"{"detail":"Simulation already running"}"#), "Simulation already running");
        assert_eq!(detail("  plain failure \n"), "plain failure");
    }

    #[test]
    fn test_invalid_user_agent_rejected() {
        assert!(BackendClient::new("http://x", "bad\nagent", Duration::from_secs(1), 10.0).is_err());
    }
}

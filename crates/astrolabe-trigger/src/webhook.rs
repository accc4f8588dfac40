//! Webhook trigger — POST to a pipeline webhook and track the event id.
//!
//! The webhook reply carries an `eventId`. When a spin CLI config is
//! configured, the confirmation callback looks that event up through the
//! gate API using the cached OAuth2 token.

use std::collections::BTreeMap;
use std::path::Path;

use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, info};

use astrolabe_core::WebhookTriggerConfig;

use crate::{
    first_execution_status, ConfirmFn, PipelineStatus, PipelineTrigger, TriggerError,
    TriggerFuture,
};

/// Pipeline trigger that fires an HTTP webhook.
pub struct WebhookTrigger {
    client: reqwest::Client,
    url: String,
    body: BTreeMap<String, String>,
    gate: Option<GateSession>,
    /// Event id of the last successful pull.
    event_id: Option<String>,
}

/// Everything needed to query the gate API for one application.
#[derive(Debug, Clone)]
struct GateSession {
    endpoint: String,
    application: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct WebhookReply {
    #[serde(rename = "eventId")]
    event_id: String,
}

/// The subset of the spin CLI config file we read.
#[derive(Deserialize)]
struct SpinConfigFile {
    gate: GateSection,
    #[serde(default)]
    auth: Option<AuthSection>,
}

#[derive(Deserialize)]
struct GateSection {
    endpoint: String,
}

#[derive(Deserialize)]
struct AuthSection {
    #[serde(default)]
    oauth2: Option<OAuth2Section>,
}

#[derive(Deserialize)]
struct OAuth2Section {
    #[serde(default, rename = "cachedToken")]
    cached_token: Option<CachedToken>,
}

#[derive(Deserialize)]
struct CachedToken {
    #[serde(alias = "access_token", alias = "accessToken")]
    accesstoken: String,
}

impl WebhookTrigger {
    pub fn new(config: &WebhookTriggerConfig) -> Result<Self, TriggerError> {
        let gate = match &config.spin_cli_config {
            Some(path) => {
                let application = config.application.clone().ok_or_else(|| {
                    TriggerError::Config("application is required with spinCliConfig".into())
                })?;
                Some(load_gate_session(path, application)?)
            }
            None => None,
        };

        Ok(Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            body: config.body.clone(),
            gate,
            event_id: None,
        })
    }

    /// Event id returned by the last successful [`PipelineTrigger::pull`].
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    fn confirm_fn(&self, event_id: String) -> ConfirmFn {
        let Some(gate) = self.gate.clone() else {
            return Box::new(|| -> TriggerFuture<'static, PipelineStatus> {
                Box::pin(async { Ok(PipelineStatus::Unknown) })
            });
        };
        let client = self.client.clone();
        Box::new(move || -> TriggerFuture<'static, PipelineStatus> {
            let client = client.clone();
            let gate = gate.clone();
            let event_id = event_id.clone();
            Box::pin(async move { gate.execution_status(&client, &event_id).await })
        })
    }
}

impl PipelineTrigger for WebhookTrigger {
    fn kind(&self) -> &'static str {
        "webhook"
    }

    fn pull(&mut self) -> TriggerFuture<'_, ConfirmFn> {
        Box::pin(async move {
            let payload = serde_json::to_vec(&self.body).map_err(|e| {
                TriggerError::Request(format!("failed to serialize webhook body: {e}"))
            })?;

            let resp = self
                .client
                .post(&self.url)
                .header(CONTENT_TYPE, "application/json")
                .body(payload)
                .send()
                .await
                .map_err(|e| {
                    TriggerError::Request(format!("webhook request to {} failed: {e}", self.url))
                })?;

            let status = resp.status();
            if !status.is_success() {
                return Err(TriggerError::Request(format!(
                    "webhook {} returned {status}",
                    self.url
                )));
            }

            let reply: WebhookReply = resp
                .json()
                .await
                .map_err(|e| TriggerError::Request(format!("unreadable webhook reply: {e}")))?;

            info!(url = %self.url, event_id = %reply.event_id, "pipeline webhook accepted");
            self.event_id = Some(reply.event_id.clone());
            Ok(self.confirm_fn(reply.event_id))
        })
    }
}

impl GateSession {
    async fn execution_status(
        &self,
        client: &reqwest::Client,
        event_id: &str,
    ) -> Result<PipelineStatus, TriggerError> {
        let url = format!(
            "{}/applications/{}/executions/search",
            self.endpoint.trim_end_matches('/'),
            self.application
        );

        let mut req = client.get(&url).query(&[("eventId", event_id)]);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| TriggerError::Request(format!("gate request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TriggerError::Request(format!("gate returned {status}")));
        }

        let executions: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| TriggerError::Request(format!("unreadable gate reply: {e}")))?;
        let progress = first_execution_status(&executions);
        debug!(%event_id, ?progress, "gate execution status");
        Ok(progress)
    }
}

fn load_gate_session(path: &Path, application: String) -> Result<GateSession, TriggerError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| TriggerError::Config(format!("failed to read {}: {e}", path.display())))?;
    let file: SpinConfigFile = serde_yaml::from_str(&content)
        .map_err(|e| TriggerError::Config(format!("failed to parse {}: {e}", path.display())))?;

    let token = file
        .auth
        .and_then(|a| a.oauth2)
        .and_then(|o| o.cached_token)
        .map(|t| t.accesstoken);

    Ok(GateSession {
        endpoint: file.gate.endpoint,
        application,
        token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use hyper::body::Incoming;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response};
    use hyper_util::rt::TokioIo;
    use tokio::net::TcpListener;

    /// What the fake pipeline backend saw.
    #[derive(Default)]
    struct Seen {
        bodies: Vec<String>,
        authorization: Vec<String>,
        queries: Vec<String>,
    }

    /// Serve canned replies: POST /webhook answers `webhook_reply`, GET on
    /// the executions search answers `gate_reply`.
    async fn fake_backend(
        webhook_status: u16,
        webhook_reply: &'static str,
        gate_reply: &'static str,
    ) -> (SocketAddr, Arc<Mutex<Seen>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Seen::default()));
        let seen_srv = seen.clone();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let seen = seen_srv.clone();
                tokio::spawn(async move {
                    let svc = service_fn(move |req: Request<Incoming>| {
                        let seen = seen.clone();
                        async move {
                            let path = req.uri().path().to_string();
                            let query = req.uri().query().unwrap_or_default().to_string();
                            let auth = req
                                .headers()
                                .get("authorization")
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string);
                            let body = req.into_body().collect().await?.to_bytes();

                            let (status, reply) = if path == "/webhook" {
                                seen.lock()
                                    .unwrap()
                                    .bodies
                                    .push(String::from_utf8_lossy(&body).into_owned());
                                (webhook_status, webhook_reply)
                            } else {
                                let mut s = seen.lock().unwrap();
                                s.queries.push(query);
                                s.authorization.extend(auth);
                                (200, gate_reply)
                            };
                            Ok::<_, hyper::Error>(
                                Response::builder()
                                    .status(status)
                                    .header("content-type", "application/json")
                                    .body(Full::new(Bytes::from(reply)))
                                    .unwrap(),
                            )
                        }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), svc)
                        .await;
                });
            }
        });

        (addr, seen)
    }

    fn config(addr: SocketAddr) -> WebhookTriggerConfig {
        WebhookTriggerConfig {
            url: format!("http://{addr}/webhook"),
            body: BTreeMap::from([("key".to_string(), "value".to_string())]),
            spin_cli_config: None,
            application: None,
        }
    }

    #[tokio::test]
    async fn pull_posts_body_and_captures_event_id() {
        let (addr, seen) = fake_backend(200, r#"{"eventId":"e1"}"#, "[]").await;
        let mut trigger = WebhookTrigger::new(&config(addr)).unwrap();

        let mut confirm = trigger.pull().await.unwrap();
        assert_eq!(trigger.event_id(), Some("e1"));
        assert_eq!(seen.lock().unwrap().bodies, vec![r#"{"key":"value"}"#.to_string()]);

        // No gate configured: confirmation is a no-op that reports Unknown.
        assert_eq!(confirm().await.unwrap(), PipelineStatus::Unknown);
    }

    #[tokio::test]
    async fn non_success_status_is_a_request_error() {
        let (addr, _) = fake_backend(500, r#"{"error":"boom"}"#, "[]").await;
        let mut trigger = WebhookTrigger::new(&config(addr)).unwrap();
        assert!(matches!(trigger.pull().await, Err(TriggerError::Request(_))));
        assert_eq!(trigger.event_id(), None);
    }

    #[tokio::test]
    async fn reply_without_event_id_is_a_request_error() {
        let (addr, _) = fake_backend(200, r#"{"status":"ok"}"#, "[]").await;
        let mut trigger = WebhookTrigger::new(&config(addr)).unwrap();
        assert!(matches!(trigger.pull().await, Err(TriggerError::Request(_))));
    }

    #[tokio::test]
    async fn unreachable_webhook_is_a_request_error() {
        // Bind then drop to get a port nobody listens on.
        let addr = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap()
        };
        let mut trigger = WebhookTrigger::new(&config(addr)).unwrap();
        assert!(matches!(trigger.pull().await, Err(TriggerError::Request(_))));
    }

    #[tokio::test]
    async fn confirm_queries_gate_with_cached_token() {
        let (addr, seen) = fake_backend(
            200,
            r#"{"eventId":"e1"}"#,
            r#"[{"id":"01H","status":"RUNNING"}]"#,
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let spin_config = dir.path().join("config");
        std::fs::write(
            &spin_config,
            format!(
                "gate:
  endpoint: http://{addr}/
auth:
  oauth2:
    cachedToken:
      accesstoken: tok-123
"
            ),
        )
        .unwrap();

        let mut cfg = config(addr);
        cfg.spin_cli_config = Some(spin_config);
        cfg.application = Some("web".into());

        let mut trigger = WebhookTrigger::new(&cfg).unwrap();
        let mut confirm = trigger.pull().await.unwrap();

        assert_eq!(confirm().await.unwrap(), PipelineStatus::Running);
        assert_eq!(confirm().await.unwrap(), PipelineStatus::Running);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.queries, vec!["eventId=e1".to_string(), "eventId=e1".to_string()]);
        assert_eq!(seen.authorization[0], "Bearer tok-123");
    }

    #[test]
    fn missing_spin_config_is_a_config_error() {
        let cfg = WebhookTriggerConfig {
            url: "http://127.0.0.1:1/webhook".into(),
            body: BTreeMap::new(),
            spin_cli_config: Some("/nonexistent/spin/config".into()),
            application: Some("web".into()),
        };
        assert!(matches!(WebhookTrigger::new(&cfg), Err(TriggerError::Config(_))));
    }
}

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::modules::action::Action;
use crate::modules::error::{Result, SwarmError};

pub const DEFAULT_API_URL: &str = "https://discordia.ai/api";
pub const MAX_ATTEMPTS: u32 = 3;

/// Where snapshots come from and batches go.
pub trait GameClient {
    /// The raw `data` object of the current game state.
    fn fetch_state(&self) -> Result<Value>;
    fn submit_actions(&self, actions: &[Action]) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ActionBatch<'a> {
    actions: &'a [Action],
}

#[derive(Debug, Clone)]
pub struct HttpGameClient {
    base: String,
    api_key: String,
    http: Client,
}

impl HttpGameClient {
    pub fn new(
        base: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> std::result::Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    fn read_envelope(resp: reqwest::blocking::Response) -> Result<Envelope> {
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(SwarmError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let envelope: Envelope = serde_json::from_str(&body)?;
        if !envelope.success {
            return Err(SwarmError::Rejected(
                envelope.error.clone().unwrap_or(body),
            ));
        }
        Ok(envelope)
    }

    fn get_state_once(&self) -> Result<Value> {
        let resp = self
            .http
            .get(self.url("game/state"))
            .header("X-API-Key", &self.api_key)
            .send()?;
        Ok(Self::read_envelope(resp)?.data)
    }

    fn post_actions_once(&self, actions: &[Action]) -> Result<()> {
        let resp = self
            .http
            .post(self.url("actions"))
            .header("X-API-Key", &self.api_key)
            .json(&ActionBatch { actions })
            .send()?;
        Self::read_envelope(resp).map(|_| ())
    }
}

impl GameClient for HttpGameClient {
    fn fetch_state(&self) -> Result<Value> {
        with_retries("fetch_state", || self.get_state_once())
    }

    fn submit_actions(&self, actions: &[Action]) -> Result<()> {
        if actions.is_empty() {
            debug!("empty batch, nothing to submit");
            return Ok(());
        }
        with_retries("submit_actions", || self.post_actions_once(actions))
    }
}

/// Run `call` up to `MAX_ATTEMPTS` times with a short random pause between tries.
pub fn with_retries<T>(label: &str, mut call: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        if attempts > 1 {
            // simple jitter: 50-150ms
            let jitter_ms = 50 + (rand::random::<u64>() % 100);
            thread::sleep(Duration::from_millis(jitter_ms));
        }
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if attempts < MAX_ATTEMPTS => {
                warn!(call = label, attempt = attempts, error = %err, "retrying");
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use crate::modules::entity::EntityId;

    #[test]
    fn retries_until_success() {
        let calls = Cell::new(0);
        let result = with_retries("test", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(SwarmError::Rejected("busy".into()))
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retries("test", || {
            calls.set(calls.get() + 1);
            Err(SwarmError::Config("nope".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), MAX_ATTEMPTS);
    }

    #[test]
    fn batch_body_wraps_actions() {
        let actions = vec![Action::Harvest {
            unit_id: EntityId::Num(1),
            target_id: EntityId::from("src"),
        }];
        let body = serde_json::to_value(ActionBatch { actions: &actions }).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"actions": [{"type": "harvest", "unitId": 1, "targetId": "src"}]})
        );
    }

    #[test]
    fn empty_batch_is_not_sent() {
        // Unroutable address: any real request would fail.
        let client = HttpGameClient::new("http://127.0.0.1:9", "key", Duration::from_millis(50)).unwrap();
        assert!(client.submit_actions(&[]).is_ok());
    }
}

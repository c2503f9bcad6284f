//! Upstash REST backend.
//!
//! Each command is one HTTPS request: the command and its arguments are POSTed
//! as a JSON array and the reply arrives as `{"result": ..}` or `{"error": ..}`.
//! There is no persistent socket, so the backend is safe to share across tasks
//! and survives serverless-style connection churn.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::backend::{KeyTtl, KvBackend, KvError};

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the Upstash Redis REST API.
#[derive(Clone)]
pub struct UpstashBackend {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl std::fmt::Debug for UpstashBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstashBackend")
            .field("url", &self.url)
            .field("token", &"***")
            .finish()
    }
}

impl UpstashBackend {
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, KvError> {
        let url = url.into().trim_end_matches('/').to_string();
        if url.is_empty() {
            return Err(KvError::Config("Upstash REST url is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KvError::Config(e.to_string()))?;
        Ok(Self {
            http,
            url,
            token: token.into(),
        })
    }

    async fn command(&self, args: Vec<String>) -> Result<Value, KvError> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&args)
            .send()
            .await?;

        let status = response.status();
        let reply: Reply = response.json().await.map_err(|e| {
            if status.is_success() {
                KvError::Protocol(e.to_string())
            } else {
                KvError::Backend(format!("HTTP {status}"))
            }
        })?;

        if let Some(error) = reply.error {
            return Err(KvError::Backend(error));
        }
        if !status.is_success() {
            return Err(KvError::Backend(format!("HTTP {status}")));
        }
        Ok(reply.result.unwrap_or(Value::Null))
    }

    async fn integer(&self, args: Vec<String>) -> Result<i64, KvError> {
        let value = self.command(args).await?;
        value
            .as_i64()
            .ok_or_else(|| KvError::Protocol(format!("expected integer reply, got {value}")))
    }
}

fn cmd(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| (*p).to_string()).collect()
}

#[async_trait]
impl KvBackend for UpstashBackend {
    fn name(&self) -> &'static str {
        "upstash"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        match self.command(cmd(&["GET", key])).await? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(KvError::Protocol(format!(
                "expected string reply, got {other}"
            ))),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), KvError> {
        let ttl = ttl_secs.to_string();
        self.command(cmd(&["SET", key, value, "EX", &ttl])).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<usize, KvError> {
        Ok(self.integer(cmd(&["DEL", key])).await?.max(0) as usize)
    }

    async fn del_many(&self, keys: &[String]) -> Result<usize, KvError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut args = Vec::with_capacity(keys.len() + 1);
        args.push("DEL".to_string());
        args.extend(keys.iter().cloned());
        Ok(self.integer(args).await?.max(0) as usize)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, KvError> {
        match self.command(cmd(&["KEYS", pattern])).await? {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => Err(KvError::Protocol(format!("expected key string, got {other}"))),
                })
                .collect(),
            other => Err(KvError::Protocol(format!("expected array reply, got {other}"))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        Ok(self.integer(cmd(&["EXISTS", key])).await? > 0)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, KvError> {
        Ok(KeyTtl::from_reply(self.integer(cmd(&["TTL", key])).await?))
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, KvError> {
        let ttl = ttl_secs.to_string();
        Ok(self.integer(cmd(&["EXPIRE", key, &ttl])).await? == 1)
    }

    async fn flush(&self) -> Result<(), KvError> {
        self.command(cmd(&["FLUSHDB"])).await?;
        Ok(())
    }

    async fn dbsize(&self) -> Result<u64, KvError> {
        Ok(self.integer(cmd(&["DBSIZE"])).await?.max(0) as u64)
    }
}

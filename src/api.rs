//! HTTP access to the deploy controller's web front end.

use crate::model::{ActionKind, ConsoleConfig, StatusResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Request/response surface of the controller server. The poller, dispatcher,
/// and controller all go through this seam so tests can inject a scripted
/// backend instead of a live server.
#[async_trait]
pub trait DeployBackend: Send + Sync {
    async fn fetch_status(&self) -> Result<bool>;
    async fn send_action(&self, action: ActionKind) -> Result<()>;
}

#[derive(Clone)]
pub struct DeployApi {
    http: reqwest::Client,
    base_url: String,
}

impl DeployApi {
    pub fn new(cfg: &ConsoleConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(10))
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl DeployBackend for DeployApi {
    async fn fetch_status(&self) -> Result<bool> {
        let body: StatusResponse = self
            .http
            .get(self.url("/deploy/status"))
            .send()
            .await
            .context("request /deploy/status")?
            .error_for_status()
            .context("/deploy/status returned an error")?
            .json()
            .await
            .context("decode status body")?;
        Ok(body.is_running())
    }

    async fn send_action(&self, action: ActionKind) -> Result<()> {
        // Response body is ignored; the next observation is the source of truth.
        self.http
            .post(self.url(&format!("/deploy/please/{}", action.as_str())))
            .send()
            .await
            .with_context(|| format!("request /deploy/please/{}", action.as_str()))?
            .error_for_status()
            .with_context(|| format!("{} command rejected", action.as_str()))?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> ConsoleConfig {
        ConsoleConfig {
            base_url: base_url.to_string(),
            poll_interval: Duration::from_secs(3),
            reconnect_delay: Duration::from_secs(3),
            max_retries: 3,
            refresh_after_action: false,
            user_agent: "deploy-console/test".into(),
        }
    }

    #[test]
    fn trailing_slash_in_base_url_is_tolerated() {
        let api = DeployApi::new(&config("http://localhost:5000/")).unwrap();
        assert_eq!(api.url("/deploy/status"), "http://localhost:5000/deploy/status");
        let api = DeployApi::new(&config("http://localhost:5000")).unwrap();
        assert_eq!(api.url("/deploy/status"), "http://localhost:5000/deploy/status");
    }
}

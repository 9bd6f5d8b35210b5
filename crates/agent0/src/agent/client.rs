//! HTTP client for the remote agent endpoint.

use async_trait::async_trait;
use log::error;

use super::types::{AgentReply, AgentRequest, AgentTurn};
use super::{AgentApi, AgentError, AgentResult};

/// Client for `POST {api_host}/agent`.
pub struct AgentClient {
    base_url: String,
    http: reqwest::Client,
}

impl AgentClient {
    /// Create a client for the given API host.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AgentApi for AgentClient {
    async fn send(&self, token: &str, messages: &[AgentTurn]) -> AgentResult<String> {
        let url = format!("{}/agent", self.base_url);
        let body = AgentRequest {
            messages: messages.to_vec(),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // 401 gets its own log line for diagnosis, but the caller
            // treats every non-success status the same way.
            if status == reqwest::StatusCode::UNAUTHORIZED {
                error!("unauthorized: check API permissions or token validity");
            } else {
                error!("agent endpoint responded with status {}", status);
            }
            return Err(AgentError::Status(status));
        }

        let reply = response.json::<AgentReply>().await?;
        Ok(reply.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        let client = AgentClient::new("https://api.example.com/");
        assert_eq!(client.base_url, "https://api.example.com");
    }
}

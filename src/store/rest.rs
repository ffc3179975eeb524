use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;

use super::SessionStore;
use crate::models::{NewSession, SessionFilter, SessionRecord, SessionUpdate};

const SESSIONS_PATH: [&str; 2] = ["api", "focus-sessions"];

#[derive(Deserialize)]
struct CreatedSession {
    id: String,
}

/// `SessionStore` backed by the application's REST API.
///
/// No retries happen here; a failed autosave is superseded by the next one.
#[derive(Clone)]
pub struct RestSessionStore {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl RestSessionStore {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid API base URL {base_url}"))?;
        if base_url.cannot_be_a_base() {
            bail!("API base URL {base_url} cannot carry a path");
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// `{base}/api/focus-sessions`, plus the session id as one escaped segment.
    fn url(&self, session_id: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL always has path segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(SESSIONS_PATH);
            if let Some(id) = session_id {
                segments.push(id);
            }
        }
        url
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .with_context(|| format!("{what}: request failed"))?;

        let status = response.status();
        debug!("{what}: HTTP {status}");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{what}: HTTP {status} {body}"));
        }
        Ok(response)
    }
}

#[async_trait]
impl SessionStore for RestSessionStore {
    async fn create_session(&self, session: &NewSession) -> Result<String> {
        let response = self
            .send(self.client.post(self.url(None)).json(session), "create session")
            .await?;
        let created: CreatedSession = response
            .json()
            .await
            .context("create session: malformed response body")?;
        Ok(created.id)
    }

    async fn update_session(&self, session_id: &str, update: &SessionUpdate) -> Result<()> {
        self.send(
            self.client.patch(self.url(Some(session_id))).json(update),
            "update session",
        )
        .await?;
        Ok(())
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(flag) = filter.concentration_mode {
            query.push(("concentrationMode", flag.to_string()));
        }
        if let Some(limit) = filter.limit {
            query.push(("limit", limit.to_string()));
        }

        let response = self
            .send(self.client.get(self.url(None)).query(&query), "list sessions")
            .await?;
        let mut sessions: Vec<SessionRecord> = response
            .json()
            .await
            .context("list sessions: malformed response body")?;

        sessions.retain(|s| filter.matches(s));
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        if let Some(limit) = filter.limit {
            sessions.truncate(limit);
        }
        Ok(sessions)
    }
}

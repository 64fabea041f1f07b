// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod resource;

pub use resource::ApiResource;

use acadmin_app::{
    AuthGrant, ChatReply, ChatSession, ChatSessionDetail, ChatSessionId, EntityKind, ListQuery,
    Page, RecordId, UserProfile,
};
use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking client for the academic REST API.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    access_token: Option<String>,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("api.base_url must not be empty -- set it in config.toml or ACADMIN_API_URL");
        }
        let base_url = Url::parse(trimmed)
            .with_context(|| format!("api.base_url {trimmed:?} is not a valid URL"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "api.base_url must use http or https, got {:?}",
                base_url.scheme()
            );
        }
        if base_url.cannot_be_a_base() {
            bail!("api.base_url {trimmed:?} cannot carry a path");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            access_token: None,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn set_access_token(&mut self, token: Option<String>) {
        self.access_token = token.filter(|token| !token.trim().is_empty());
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.set_access_token(Some(token.into()));
        self
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("api.base_url cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())));
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        tracing::debug!(%method, path = url.path(), "api request");
        let builder = self.http.request(method, url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let error = clean_error_response(status, &body);
            tracing::warn!(status = status.as_u16(), error = %error, "api request failed");
            return Err(error);
        }
        Ok(response)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, url))?;
        response.json().with_context(|| format!("decode {what}"))
    }

    /// One page of `kind`'s collection.
    pub fn fetch_page<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        query: &ListQuery,
    ) -> Result<Page<T>> {
        let url = self.endpoint(&[kind.collection()], &query.query_pairs())?;
        let page: Page<T> = self.get_json(url, &format!("{} page", kind.noun()))?;
        Ok(page.normalized())
    }

    pub(crate) fn create<I: Serialize + ?Sized>(&self, kind: EntityKind, input: &I) -> Result<()> {
        let url = self.endpoint(&[kind.collection()], &[])?;
        self.send(self.request(Method::POST, url).json(input))
            .with_context(|| format!("create {}", kind.noun()))?;
        Ok(())
    }

    pub(crate) fn update<I: Serialize + ?Sized>(
        &self,
        kind: EntityKind,
        id: &RecordId,
        input: &I,
    ) -> Result<()> {
        let url = self.endpoint(&[kind.collection(), id.as_str()], &[])?;
        self.send(self.request(Method::PUT, url).json(input))
            .with_context(|| format!("update {} {id}", kind.noun()))?;
        Ok(())
    }

    pub(crate) fn delete(&self, kind: EntityKind, id: &RecordId) -> Result<()> {
        let url = self.endpoint(&[kind.collection(), id.as_str()], &[])?;
        self.send(self.request(Method::DELETE, url))
            .with_context(|| format!("delete {} {id}", kind.noun()))?;
        Ok(())
    }

    /// Sends one user message. The first message of a conversation creates
    /// the session; later ones pass its id.
    pub fn send_message(
        &self,
        content: &str,
        topic: Option<&str>,
        session: Option<&ChatSessionId>,
    ) -> Result<ChatReply> {
        let mut query = vec![("content", content.to_owned())];
        if let Some(topic) = topic {
            query.push(("topic", topic.to_owned()));
        }
        if let Some(session) = session {
            query.push(("aiChatLogId", session.to_string()));
        }
        let url = self.endpoint(&["messages"], &query)?;
        let response = self.send(self.request(Method::POST, url))?;
        response.json().context("decode chat reply")
    }

    pub fn load_session(&self, id: &ChatSessionId) -> Result<ChatSessionDetail> {
        let url = self.endpoint(&["ai-chat-log", id.as_str()], &[])?;
        self.get_json(url, "chat session")
    }

    pub fn delete_session(&self, id: &ChatSessionId) -> Result<()> {
        let url = self.endpoint(&["ai-chat-log", id.as_str()], &[])?;
        self.send(self.request(Method::DELETE, url))
            .with_context(|| format!("delete chat session {id}"))?;
        Ok(())
    }

    pub fn list_sessions(&self, page_number: u32, page_size: u32) -> Result<Page<ChatSession>> {
        let url = self.endpoint(
            &["ai-chat-log"],
            &[
                ("pageNumber", page_number.max(1).to_string()),
                ("pageSize", page_size.max(1).to_string()),
            ],
        )?;
        let page: Page<ChatSession> = self.get_json(url, "chat session list")?;
        Ok(page.normalized())
    }

    pub fn login(&self, email: &str, password: &str) -> Result<AuthGrant> {
        let url = self.endpoint(&["auth", "login"], &[])?;
        let body = LoginRequest { email, password };
        let response = self
            .send(self.request(Method::POST, url).json(&body))
            .context("sign in")?;
        response.json().context("decode login response")
    }

    /// Exchanges an identity-provider token for API tokens.
    pub fn login_federated(&self, token: &str) -> Result<AuthGrant> {
        let url = self.endpoint(&["auth", "login-google"], &[])?;
        let response = self
            .send(self.request(Method::POST, url).json(&FederatedLoginRequest { token }))
            .context("sign in with identity token")?;
        response.json().context("decode login response")
    }

    pub fn current_user(&self) -> Result<UserProfile> {
        let url = self.endpoint(&["auth", "me"], &[])?;
        self.get_json(url, "profile")
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct FederatedLoginRequest<'a> {
    token: &'a str,
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!(
            "request to {base_url} timed out -- raise [api].timeout or check the server ({error})"
        );
    }
    anyhow!("cannot reach {base_url} -- check [api].base_url and that the API is running ({error})")
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(message) = parsed
            .message
            .or(parsed.title)
            .filter(|message| !message.trim().is_empty())
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message.trim());
    }

    let body = body.trim();
    if !body.is_empty() && body.len() < 100 && !body.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), body);
    }

    anyhow!("server returned {}", status.as_u16())
}

//! Shared request plumbing: bearer auth, status checks and JSON decoding.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::auth::Authenticator;
use crate::error::{ApiError, Result};

/// How the bearer token is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenHeader {
    /// `Authorization: Bearer ...`
    Authorization,
    /// `X-Auth-User-Token: Bearer ...`, used by CIS.
    UserToken,
}

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    auth: Arc<Authenticator>,
    token_header: TokenHeader,
    headers: Vec<(&'static str, String)>,
}

impl RestClient {
    pub fn new(client: reqwest::Client, auth: Arc<Authenticator>) -> Self {
        Self {
            client,
            auth,
            token_header: TokenHeader::Authorization,
            headers: Vec::new(),
        }
    }

    pub fn with_token_header(mut self, header: TokenHeader) -> Self {
        self.token_header = header;
        self
    }

    /// Send `name: value` on every request.
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.auth.token().await?;
        let mut builder = self.client.request(method, url);
        builder = match self.token_header {
            TokenHeader::Authorization => builder.bearer_auth(token),
            TokenHeader::UserToken => builder.header("X-Auth-User-Token", format!("Bearer {}", token)),
        };
        for (name, value) in &self.headers {
            builder = builder.header(*name, value);
        }
        Ok(builder)
    }

    async fn send(&self, method: &'static str, url: &str, builder: RequestBuilder) -> Result<reqwest::Response> {
        debug!(method, url, "request");
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                method,
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let builder = self.request(Method::GET, url).await?.query(query);
        let response = self.send("GET", url, builder).await?;
        decode(url, response).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T> {
        let builder = self.request(Method::POST, url).await?.query(query).json(body);
        let response = self.send("POST", url, builder).await?;
        decode(url, response).await
    }

    pub async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let builder = self.request(Method::GET, url).await?.query(query);
        let response = self.send("GET", url, builder).await?;
        Ok(response.text().await?)
    }

    pub async fn delete(&self, url: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, url).await?;
        self.send("DELETE", url, builder).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(url: &str, response: reqwest::Response) -> Result<T> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| ApiError::Decode(format!("{}: {}", url, e)))
}

/// Value of query parameter `key` in an absolute or server-relative href.
pub fn query_param(href: &str, key: &str) -> Option<String> {
    let base = Url::parse("http://localhost/").ok()?;
    let url = base.join(href).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Percent-encode one path segment (identifiers may be CRNs).
pub fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

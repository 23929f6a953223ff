//! Blocking JSON client for the formations API.
//!
//! Responses are wrapped in a `{"response": ...}` envelope. Every call is
//! authenticated with a bearer token when one is configured.

use crate::error::{Error, Result};
use crate::service::{
    CatalogService, Formation, RenderRequest, Renders, RenderingService, Snapshot,
    SnapshotService,
};
use log::debug;
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Debug, Serialize)]
struct RenderBody<'a> {
    body: &'a str,
}

/// Orders snapshots by creation time, most recent first.
///
/// Timestamps are RFC 3339 strings, which sort chronologically as text.
/// Snapshots without one go last, in the order the API returned them.
fn newest_first(mut snapshots: Vec<Snapshot>) -> Vec<Snapshot> {
    snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    snapshots
}

pub struct ApiClient {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    /// Creates a client rooted at `base_url`.
    ///
    /// # Errors
    /// * `Error::UrlError` if `base_url` is not a valid URL
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            http: Client::new(),
            base: Url::parse(&base_url)?,
            token,
        })
    }

    /// Absolute URL of an API path.
    pub fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        debug!("GET {}", url);
        self.send(self.http.get(url))
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path)?;
        debug!("POST {}", url);
        self.send(self.http.post(url).json(body))
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(Error::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        let envelope: Envelope<T> = response.json()?;
        Ok(envelope.response)
    }
}

impl SnapshotService for ApiClient {
    fn list_snapshots(&self, stack: &str) -> Result<Vec<Snapshot>> {
        let snapshots = self.get(&format!("stacks/{stack}/snapshots"))?;
        Ok(newest_first(snapshots))
    }
}

impl CatalogService for ApiClient {
    fn load_formation(&self, stack: &str, name: &str) -> Result<Formation> {
        let formations: Vec<Formation> = self.get(&format!("stacks/{stack}/formations"))?;
        formations
            .into_iter()
            .find(|formation| formation.name == name)
            .ok_or_else(|| Error::FormationNotFound {
                name: name.to_string(),
            })
    }
}

impl RenderingService for ApiClient {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Renders> {
        let path = format!(
            "stacks/{}/snapshots/{}/formations/{}/stencils/{}/render",
            request.stack, request.snapshot, request.formation, request.stencil
        );
        let body = String::from_utf8_lossy(request.body);
        self.post(&path, &RenderBody { body: &body })
    }
}

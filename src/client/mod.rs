//! Thin STAC API client.
//!
//! Covers exactly what the conformance checks exercise: opening a landing
//! page, listing collections, item search with paging, and building
//! aggregation URLs.

pub mod search;

pub use search::{aggregate_url, ItemSearch, PageStream, SearchMethod, SearchParams};

use crate::error::{Result, StacError};
use crate::types::{find_link, Catalog, Collection, Link};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Longest response body kept in a [`StacError::Status`] message.
const MAX_ERROR_BODY: usize = 512;

/// Upper bound on `next` links followed when listing collections.
const MAX_COLLECTION_PAGES: usize = 1000;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("esgf-stac-tests/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

pub fn build_http_client(options: &ClientOptions) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(options.timeout)
        .user_agent(options.user_agent.clone())
        .build()
        .map_err(|e| StacError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Normalise an endpoint given on the command line: bare host names get
/// `https://`, trailing slashes are dropped.
///
/// # Errors
/// Returns [`StacError::InvalidEndpoint`] if the result is not an http(s) URL.
pub fn normalize_endpoint(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StacError::InvalidEndpoint("empty endpoint".to_string()));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let url = Url::parse(&with_scheme)
        .map_err(|e| StacError::InvalidEndpoint(format!("'{}': {}", raw, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(StacError::InvalidEndpoint(format!(
            "'{}': scheme must be http or https",
            raw
        )));
    }
    Ok(with_scheme.trim_end_matches('/').to_string())
}

/// Turn a response into JSON, mapping non-2xx statuses to
/// [`StacError::Status`].
pub(crate) async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let url = response.url().to_string();
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            body.truncate(cut);
        }
        return Err(StacError::Status {
            url,
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| StacError::Json(format!("{}: {}", url, e)))
}

pub(crate) async fn get_json(http: &reqwest::Client, url: &str) -> Result<Value> {
    tracing::debug!(url, "GET");
    let response = http.get(url).send().await?;
    read_json(response).await
}

/// A STAC API opened at its landing page.
#[derive(Debug, Clone)]
pub struct StacClient {
    root: String,
    landing: Catalog,
    http: reqwest::Client,
}

impl StacClient {
    pub async fn open(endpoint: &str, options: &ClientOptions) -> Result<Self> {
        let http = build_http_client(options)?;
        Self::open_with(endpoint, http).await
    }

    /// Open with an existing HTTP client so connection pools can be shared
    /// between checks.
    pub async fn open_with(endpoint: &str, http: reqwest::Client) -> Result<Self> {
        let root = normalize_endpoint(endpoint)?;
        let landing_json = get_json(&http, &root).await?;
        let landing: Catalog = serde_json::from_value(landing_json)
            .map_err(|e| StacError::Json(format!("landing page of {}: {}", root, e)))?;
        tracing::debug!(
            endpoint = %root,
            catalog = %landing.id,
            conformance_classes = landing.conforms_to.len(),
            "Opened STAC catalog"
        );
        Ok(Self {
            root,
            landing,
            http,
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn landing(&self) -> &Catalog {
        &self.landing
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub async fn get_json(&self, url: &str) -> Result<Value> {
        get_json(&self.http, url).await
    }

    fn collections_url(&self) -> String {
        find_link(&self.landing.links, "data")
            .map(|l| l.href.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("{}/collections", self.root))
    }

    /// All collections as raw JSON, following `next` links.
    pub async fn collection_values(&self) -> Result<Vec<Value>> {
        let mut url = Some(self.collections_url());
        let mut collections = Vec::new();
        let mut pages = 0;

        while let Some(current) = url.take() {
            pages += 1;
            if pages > MAX_COLLECTION_PAGES {
                tracing::warn!(endpoint = %self.root, "Stopped following collection pages");
                break;
            }
            let mut page = self.get_json(&current).await?;
            match page.get_mut("collections").map(Value::take) {
                Some(Value::Array(batch)) => collections.extend(batch),
                _ => {
                    return Err(StacError::Json(format!(
                        "{}: missing 'collections' array",
                        current
                    )))
                }
            }

            url = page
                .get("links")
                .and_then(|l| serde_json::from_value::<Vec<Link>>(l.clone()).ok())
                .and_then(|links| find_link(&links, "next").map(|l| l.href.clone()))
                .filter(|next| *next != current);
        }

        Ok(collections)
    }

    pub async fn get_collections(&self) -> Result<Vec<Collection>> {
        self.collection_values()
            .await?
            .into_iter()
            .map(|c| serde_json::from_value(c).map_err(StacError::from))
            .collect()
    }

    pub async fn get_collection(&self, id: &str) -> Result<Collection> {
        let url = format!(
            "{}/{}",
            self.collections_url(),
            urlencoding::encode(id)
        );
        match self.get_json(&url).await {
            Ok(value) => serde_json::from_value(value)
                .map_err(|e| StacError::Json(format!("{}: {}", url, e))),
            Err(StacError::Status { status: 404, .. }) => {
                Err(StacError::CollectionNotFound(id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Prepare an item search. POST is used when the landing page advertises
    /// a POST `search` link, GET otherwise.
    ///
    /// # Errors
    /// Returns [`StacError::MissingLink`] if the catalog has no `search` link.
    pub fn search(&self, params: SearchParams) -> Result<ItemSearch> {
        let search_links: Vec<_> = self.landing.links_with_rel("search").collect();
        let (href, method) = match search_links.iter().find(|l| l.is_post()) {
            Some(link) => (link.href.clone(), SearchMethod::Post),
            None => match search_links.first() {
                Some(link) => (link.href.clone(), SearchMethod::Get),
                None => return Err(StacError::MissingLink("search".to_string())),
            },
        };
        let url = Url::parse(&href)
            .or_else(|_| Url::parse(&format!("{}/", self.root)).and_then(|base| base.join(&href)))?;
        Ok(ItemSearch::new(self.http.clone(), url, method, params))
    }
}

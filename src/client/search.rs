use super::read_json;
use crate::error::{Result, StacError};
use crate::query::{build_query, Filter};
use crate::types::{find_link, Item, ItemCollection, Link};
use serde_json::{json, Map, Value};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMethod {
    Get,
    Post,
}

/// Item search parameters.
///
/// `max_items` is applied client side; everything else is sent to the
/// service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub collections: Vec<String>,
    pub limit: Option<u64>,
    pub max_items: Option<usize>,
    pub datetime: Option<String>,
    pub query: Vec<String>,
    pub filter: Option<Filter>,
}

impl SearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collections<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.collections = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn datetime(mut self, datetime: impl Into<String>) -> Self {
        self.datetime = Some(datetime.into());
        self
    }

    pub fn query(mut self, exprs: Vec<String>) -> Self {
        self.query = exprs;
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// JSON body for a POST search.
    pub fn to_body(&self) -> Result<Value> {
        let mut body = Map::new();
        if !self.collections.is_empty() {
            body.insert("collections".into(), json!(self.collections));
        }
        if let Some(limit) = self.limit {
            body.insert("limit".into(), json!(limit));
        }
        if let Some(datetime) = &self.datetime {
            body.insert("datetime".into(), json!(datetime));
        }
        if !self.query.is_empty() {
            body.insert("query".into(), build_query(&self.query)?);
        }
        if let Some(filter) = &self.filter {
            body.insert("filter".into(), filter.to_cql2_json());
            body.insert("filter-lang".into(), json!("cql2-json"));
        }
        Ok(Value::Object(body))
    }

    /// Query string pairs for a GET search. Structured values are sent as
    /// JSON text.
    pub fn to_query_pairs(&self) -> Result<Vec<(String, String)>> {
        let mut pairs = Vec::new();
        if !self.collections.is_empty() {
            pairs.push(("collections".to_string(), self.collections.join(",")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(datetime) = &self.datetime {
            pairs.push(("datetime".to_string(), datetime.clone()));
        }
        if !self.query.is_empty() {
            pairs.push(("query".to_string(), build_query(&self.query)?.to_string()));
        }
        if let Some(filter) = &self.filter {
            pairs.push(("filter".to_string(), filter.to_cql2_json().to_string()));
            pairs.push(("filter-lang".to_string(), "cql2-json".to_string()));
        }
        Ok(pairs)
    }
}

/// A prepared search against one endpoint. Nothing is sent until pages are
/// requested.
#[derive(Debug, Clone)]
pub struct ItemSearch {
    http: reqwest::Client,
    url: Url,
    method: SearchMethod,
    params: SearchParams,
}

impl ItemSearch {
    pub(crate) fn new(
        http: reqwest::Client,
        url: Url,
        method: SearchMethod,
        params: SearchParams,
    ) -> Self {
        Self {
            http,
            url,
            method,
            params,
        }
    }

    pub fn method(&self) -> SearchMethod {
        self.method
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    /// The GET form of this search, regardless of the method used to run it.
    pub fn url_with_parameters(&self) -> Result<Url> {
        let mut url = self.url.clone();
        let pairs = self.params.to_query_pairs()?;
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    fn first_request(&self) -> Result<PendingRequest> {
        Ok(match self.method {
            SearchMethod::Get => PendingRequest::Get(self.url_with_parameters()?),
            SearchMethod::Post => PendingRequest::Post {
                url: self.url.clone(),
                body: self.params.to_body()?,
            },
        })
    }

    /// Iterate raw result pages.
    pub fn pages_as_values(&self) -> Result<PageStream> {
        Ok(PageStream {
            http: self.http.clone(),
            next: Some(self.first_request()?),
            max_items: self.params.max_items,
            items_yielded: 0,
            pages_fetched: 0,
        })
    }

    /// All items across pages, stopping at `max_items`.
    pub async fn items(&self) -> Result<Vec<Item>> {
        let mut pages = self.pages_as_values()?;
        let mut items = Vec::new();
        while let Some(page) = pages.next_item_collection().await? {
            items.extend(page.features);
        }
        Ok(items)
    }

    /// All pages folded into a single `FeatureCollection`, stopping at
    /// `max_items`.
    pub async fn item_collection_as_value(&self) -> Result<Value> {
        let mut pages = self.pages_as_values()?;
        let mut features = Vec::new();
        while let Some(mut page) = pages.next_page().await? {
            if let Some(Value::Array(batch)) = page.get_mut("features").map(Value::take) {
                features.extend(batch);
            }
        }
        Ok(json!({"type": "FeatureCollection", "features": features}))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PendingRequest {
    Get(Url),
    Post { url: Url, body: Value },
}

impl PendingRequest {
    fn url(&self) -> &Url {
        match self {
            PendingRequest::Get(url) => url,
            PendingRequest::Post { url, .. } => url,
        }
    }

    /// The request that follows `link`, relative to this one.
    fn follow(&self, link: &Link) -> Result<PendingRequest> {
        let url = self.url().join(&link.href)?;
        if !link.is_post() {
            return Ok(PendingRequest::Get(url));
        }
        let link_body = link.body.clone().unwrap_or_else(|| json!({}));
        let body = match (self, link.merge) {
            (PendingRequest::Post { body: previous, .. }, true) => {
                let mut merged = previous.as_object().cloned().unwrap_or_default();
                if let Value::Object(overrides) = link_body {
                    merged.extend(overrides);
                }
                Value::Object(merged)
            }
            _ => link_body,
        };
        Ok(PendingRequest::Post { url, body })
    }
}

/// Pages of one search, fetched lazily by following `next` links.
pub struct PageStream {
    http: reqwest::Client,
    next: Option<PendingRequest>,
    max_items: Option<usize>,
    items_yielded: usize,
    pages_fetched: usize,
}

impl PageStream {
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn items_yielded(&self) -> usize {
        self.items_yielded
    }

    /// Fetch the next raw page, or `None` once there is no `next` link or
    /// `max_items` has been reached. A page that would overshoot `max_items`
    /// has its `features` truncated.
    pub async fn next_page(&mut self) -> Result<Option<Value>> {
        let Some(request) = self.next.take() else {
            return Ok(None);
        };

        let response = match &request {
            PendingRequest::Get(url) => {
                tracing::debug!(url = %url, "GET search page");
                self.http.get(url.clone()).send().await?
            }
            PendingRequest::Post { url, body } => {
                tracing::debug!(url = %url, body = %body, "POST search page");
                self.http.post(url.clone()).json(body).send().await?
            }
        };
        let mut page = read_json(response).await?;
        if !page.is_object() {
            return Err(StacError::Json(format!(
                "{}: search page is not an object",
                request.url()
            )));
        }
        self.pages_fetched += 1;

        let mut page_items = page
            .get("features")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        if let Some(max) = self.max_items {
            let remaining = max.saturating_sub(self.items_yielded);
            if page_items > remaining {
                if let Some(Value::Array(features)) = page.get_mut("features") {
                    features.truncate(remaining);
                }
                page_items = remaining;
            }
        }
        self.items_yielded += page_items;

        let limit_reached = self.max_items.is_some_and(|max| self.items_yielded >= max);
        if !limit_reached {
            let links: Vec<Link> = page
                .get("links")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| StacError::Json(format!("{}: links: {}", request.url(), e)))?
                .unwrap_or_default();
            if let Some(link) = find_link(&links, "next") {
                let following = request.follow(link)?;
                if following == request {
                    tracing::warn!(url = %request.url(), "next link repeats the current request");
                } else {
                    self.next = Some(following);
                }
            }
        }

        Ok(Some(page))
    }

    pub async fn next_item_collection(&mut self) -> Result<Option<ItemCollection>> {
        match self.next_page().await? {
            Some(page) => Ok(Some(serde_json::from_value(page)?)),
            None => Ok(None),
        }
    }
}

/// Rewrite a GET search URL into the aggregation endpoint: the trailing
/// `search` path segment becomes `aggregate` and `aggregations=<names>` is
/// placed in front of the existing parameters.
///
/// # Errors
/// Returns [`StacError::NotSupported`] if the URL does not end in `search`.
pub fn aggregate_url(search_url: &Url, aggregations: &[&str]) -> Result<Url> {
    let path = search_url.path().trim_end_matches('/');
    let Some(prefix) = path.strip_suffix("search").filter(|p| p.ends_with('/')) else {
        return Err(StacError::NotSupported(format!(
            "cannot derive an aggregate URL from {}",
            search_url
        )));
    };
    let mut url = search_url.clone();
    url.set_path(&format!("{}aggregate", prefix));

    let names = aggregations
        .iter()
        .map(|a| urlencoding::encode(a).into_owned())
        .collect::<Vec<_>>()
        .join(",");
    let query = match search_url.query() {
        Some(existing) if !existing.is_empty() => format!("aggregations={}&{}", names, existing),
        _ => format!("aggregations={}", names),
    };
    url.set_query(Some(&query));
    Ok(url)
}

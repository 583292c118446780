#![allow(dead_code)]

use esgf_stac::config::{ConfigOverrides, SuiteConfig};
use esgf_stac::scenarios::PUBLISHED_CMIP6_SCHEMA_URL;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const AGGREGATIONS_PARAM: &str = "cmip6_source_id_frequency,cmip6_table_id_frequency";

/// Shape of the mock STAC API.
#[derive(Debug, Clone)]
pub struct MockOptions {
    /// Items matching every search.
    pub total: usize,
    pub page_size: usize,
    /// Advertise a POST search link next to the GET one.
    pub post_search: bool,
    /// Report counts under `context` instead of `numMatched`/`numReturned`.
    pub legacy_context: bool,
    /// `numMatched` per CQL2 filter; searches with other filters match `total`.
    pub filter_counts: Vec<(Value, u64)>,
    /// Reported `numMatched` regardless of how many items are served.
    pub reported_matched: Option<u64>,
    /// Keep a `next` link on a full last page, ending with an empty page.
    pub trailing_empty_page: bool,
    /// `/collections` served in pages of this many, linked by `rel=next`.
    pub collections_page_size: Option<usize>,
    pub stac_extensions: Vec<String>,
    pub asset_fields: bool,
    pub collections: Vec<String>,
    pub buckets_per_aggregation: usize,
    pub search_delay: Option<Duration>,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            total: 25,
            page_size: 10,
            post_search: true,
            legacy_context: false,
            filter_counts: Vec::new(),
            reported_matched: None,
            trailing_empty_page: false,
            collections_page_size: None,
            stac_extensions: vec![
                PUBLISHED_CMIP6_SCHEMA_URL.to_string(),
                "https://stac-extensions.github.io/file/v2.1.0/schema.json".to_string(),
            ],
            asset_fields: true,
            collections: vec!["CMIP6".to_string()],
            buckets_per_aggregation: 3,
            search_delay: None,
        }
    }
}

pub fn item(base: &str, i: usize, options: &MockOptions) -> Value {
    let mut data = json!({
        "href": format!("{}/data/tas_Amon_{:04}.nc", base, i),
        "type": "application/netcdf",
        "roles": ["data"]
    });
    if options.asset_fields {
        data["file:size"] = json!(1_048_576 + i);
        data["file:checksum"] = json!(format!("1220{:060x}", i));
    }
    json!({
        "type": "Feature",
        "stac_version": "1.0.0",
        "stac_extensions": options.stac_extensions,
        "id": format!("CMIP6.ScenarioMIP.MIROC.MIROC6.ssp245.r1i1p1f1.Amon.tas.gn.v{}", i),
        "collection": "CMIP6",
        "geometry": null,
        "properties": {
            "start_datetime": "2015-01-16T12:00:00Z",
            "end_datetime": "2100-12-16T12:00:00Z",
            "cmip6:variable_id": "tas",
            "cmip6:source_id": "MIROC6"
        },
        "assets": {
            "data0001": data,
            "reference_file": {
                "href": format!("{}/kerchunk/{}.json", base, i),
                "type": "application/json",
                "roles": ["reference"]
            }
        },
        "links": []
    })
}

pub fn collection(base: &str, id: &str) -> Value {
    json!({
        "type": "Collection",
        "stac_version": "1.0.0",
        "id": id,
        "description": format!("{} collection", id),
        "license": "CC-BY-4.0",
        "extent": {
            "spatial": {"bbox": [[-180.0, -90.0, 180.0, 90.0]]},
            "temporal": {"interval": [["1850-01-01T00:00:00Z", null]]}
        },
        "links": [{"rel": "self", "href": format!("{}/collections/{}", base, id)}]
    })
}

struct SearchResponder {
    base: String,
    options: MockOptions,
}

impl SearchResponder {
    fn page_token(request: &Request, body: &Value) -> usize {
        let token = if request.method.as_str() == "POST" {
            body.get("token").and_then(Value::as_str).map(str::to_string)
        } else {
            request
                .url
                .query_pairs()
                .find(|(k, _)| k == "token")
                .map(|(_, v)| v.into_owned())
        };
        token
            .and_then(|t| t.strip_prefix("page:").and_then(|n| n.parse().ok()))
            .unwrap_or(0)
    }

    fn filter(request: &Request, body: &Value) -> Option<Value> {
        if request.method.as_str() == "POST" {
            return body.get("filter").cloned();
        }
        request
            .url
            .query_pairs()
            .find(|(k, _)| k == "filter")
            .and_then(|(_, v)| serde_json::from_str(&v).ok())
    }
}

impl Respond for SearchResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let page = Self::page_token(request, &body);

        let matched = Self::filter(request, &body)
            .and_then(|f| {
                self.options
                    .filter_counts
                    .iter()
                    .find(|(known, _)| *known == f)
                    .map(|(_, n)| *n)
            })
            .unwrap_or(self.options.total as u64);
        let matched_items = matched as usize;
        let matched = self.options.reported_matched.unwrap_or(matched);

        let start = (page * self.options.page_size).min(matched_items);
        let end = (start + self.options.page_size).min(matched_items);
        let features: Vec<Value> = (start..end)
            .map(|i| item(&self.base, i, &self.options))
            .collect();

        let mut links = vec![json!({"rel": "root", "href": format!("{}/", self.base)})];
        let full_last_page = self.options.trailing_empty_page
            && end - start == self.options.page_size
            && end == matched_items;
        if end < matched_items || full_last_page {
            let token = format!("page:{}", page + 1);
            if request.method.as_str() == "POST" {
                links.push(json!({
                    "rel": "next",
                    "href": format!("{}/search", self.base),
                    "method": "POST",
                    "body": {"token": token},
                    "merge": true
                }));
            } else {
                links.push(json!({"rel": "next", "href": format!("search?token={}", token)}));
            }
        }

        let mut page_body = json!({
            "type": "FeatureCollection",
            "features": features,
            "links": links
        });
        if self.options.legacy_context {
            page_body["context"] = json!({
                "matched": matched,
                "returned": end - start,
                "limit": self.options.page_size
            });
        } else {
            page_body["numMatched"] = json!(matched);
            page_body["numReturned"] = json!(end - start);
        }

        let template = ResponseTemplate::new(200).set_body_json(page_body);
        match self.options.search_delay {
            Some(delay) => template.set_delay(delay),
            None => template,
        }
    }
}

struct CollectionsResponder {
    base: String,
    ids: Vec<String>,
    page_size: Option<usize>,
}

impl Respond for CollectionsResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let page_size = self.page_size.unwrap_or(self.ids.len()).max(1);
        let page: usize = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);
        let start = (page * page_size).min(self.ids.len());
        let end = (start + page_size).min(self.ids.len());
        let collections: Vec<Value> = self.ids[start..end]
            .iter()
            .map(|id| collection(&self.base, id))
            .collect();
        let mut links = Vec::new();
        if end < self.ids.len() {
            links.push(json!({
                "rel": "next",
                "href": format!("{}/collections?page={}", self.base, page + 1)
            }));
        }
        ResponseTemplate::new(200).set_body_json(json!({
            "collections": collections,
            "links": links
        }))
    }
}

/// Start a mock STAC API and return it with its base URL.
pub async fn spawn_stac(options: MockOptions) -> (MockServer, String) {
    let server = MockServer::start().await;
    let base = server.uri();

    let mut landing_links = vec![
        json!({"rel": "self", "href": format!("{}/", base)}),
        json!({"rel": "data", "href": format!("{}/collections", base)}),
        json!({"rel": "search", "href": format!("{}/search", base), "method": "GET"}),
    ];
    if options.post_search {
        landing_links.push(
            json!({"rel": "search", "href": format!("{}/search", base), "method": "POST"}),
        );
    }
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "Catalog",
            "stac_version": "1.0.0",
            "id": "esgf-mock",
            "description": "Mock ESGF STAC API",
            "conformsTo": [
                "https://api.stacspec.org/v1.0.0/core",
                "https://api.stacspec.org/v1.0.0/item-search",
                "http://www.opengis.net/spec/cql2/1.0/conf/cql2-json"
            ],
            "links": landing_links
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(CollectionsResponder {
            base: base.clone(),
            ids: options.collections.clone(),
            page_size: options.collections_page_size,
        })
        .mount(&server)
        .await;
    for id in &options.collections {
        Mock::given(method("GET"))
            .and(path(format!("/collections/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(collection(&base, id)))
            .mount(&server)
            .await;
    }

    for verb in ["GET", "POST"] {
        Mock::given(method(verb))
            .and(path("/search"))
            .respond_with(SearchResponder {
                base: base.clone(),
                options: options.clone(),
            })
            .mount(&server)
            .await;
    }

    let buckets = |prefix: &str| -> Vec<Value> {
        (0..options.buckets_per_aggregation)
            .map(|i| json!({"key": format!("{}{}", prefix, i), "data_type": "frequency_distribution", "frequency": 10 - i}))
            .collect()
    };
    Mock::given(method("GET"))
        .and(path("/aggregate"))
        .and(query_param("aggregations", AGGREGATIONS_PARAM))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "AggregationCollection",
            "aggregations": [
                {"name": "cmip6_source_id_frequency", "data_type": "frequency_distribution", "buckets": buckets("MIROC")},
                {"name": "cmip6_table_id_frequency", "data_type": "frequency_distribution", "buckets": buckets("Amon")}
            ]
        })))
        .mount(&server)
        .await;

    (server, base)
}

pub fn suite_config(endpoint: &str, data_challenge: u8) -> SuiteConfig {
    SuiteConfig::resolve(
        ConfigOverrides {
            endpoints: Some(vec![endpoint.to_string()]),
            data_challenge: Some(data_challenge),
            http_timeout_secs: Some(5),
            case_timeout_secs: Some(10),
            ..Default::default()
        },
        None,
    )
    .unwrap()
}

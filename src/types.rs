use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A STAC link object.
///
/// `method`, `body` and `merge` come from the STAC API paging extension and
/// describe how to follow a `next` link with POST.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default)]
    pub merge: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Link {
    pub fn is_post(&self) -> bool {
        self.method
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("POST"))
    }
}

/// Find the first link with the given relation.
pub fn find_link<'a>(links: &'a [Link], rel: &str) -> Option<&'a Link> {
    links.iter().find(|l| l.rel == rel)
}

/// The landing page of a STAC API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub object_type: String,
    #[serde(default)]
    pub stac_version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "conformsTo", default)]
    pub conforms_to: Vec<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Catalog {
    /// Links with the given relation, in document order.
    pub fn links_with_rel<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| l.rel == rel)
    }

    pub fn conforms_to(&self, fragment: &str) -> bool {
        self.conforms_to.iter().any(|c| c.contains(fragment))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub extent: Option<Extent>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub stac_extensions: Vec<String>,
    #[serde(flatten)]
    pub extra_fields: Map<String, Value>,
}

/// Spatial and temporal extent of a collection.
///
/// Both halves are kept as raw JSON so that checks can assert on exactly
/// which keys the service emitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Extent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra_fields: Map<String, Value>,
}

impl Extent {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Everything else on the asset, e.g. `file:size` and `file:checksum`.
    #[serde(flatten)]
    pub extra_fields: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub assets: IndexMap<String, Asset>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub stac_extensions: Vec<String>,
}

impl Item {
    /// Assets whose media type starts with `media_type` (parameters such as
    /// `; version=4` are ignored), keyed as in the item.
    pub fn assets_with_media_type(&self, media_type: &str) -> IndexMap<&str, &Asset> {
        self.assets
            .iter()
            .filter(|(_, a)| {
                a.media_type
                    .as_deref()
                    .and_then(|t| t.split(';').next())
                    .is_some_and(|t| t.trim().eq_ignore_ascii_case(media_type))
            })
            .map(|(k, a)| (k.as_str(), a))
            .collect()
    }
}

/// Legacy paging context from the STAC API context extension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchContext {
    #[serde(default)]
    pub matched: Option<u64>,
    #[serde(default)]
    pub returned: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

/// A single page of search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemCollection {
    #[serde(default)]
    pub features: Vec<Item>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(rename = "numMatched", default)]
    pub num_matched: Option<u64>,
    #[serde(rename = "numReturned", default)]
    pub num_returned: Option<u64>,
    #[serde(default)]
    pub context: Option<SearchContext>,
}

impl ItemCollection {
    pub fn matched(&self) -> Option<u64> {
        self.num_matched
            .or_else(|| self.context.as_ref().and_then(|c| c.matched))
    }

    pub fn returned(&self) -> u64 {
        self.num_returned
            .or_else(|| self.context.as_ref().and_then(|c| c.returned))
            .unwrap_or(self.features.len() as u64)
    }

    pub fn next_link(&self) -> Option<&Link> {
        find_link(&self.links, "next")
    }
}

/// Read `numMatched` (or `context.matched`) from a raw page.
pub fn page_matched(page: &Value) -> Option<u64> {
    page.get("numMatched")
        .and_then(Value::as_u64)
        .or_else(|| page.pointer("/context/matched").and_then(Value::as_u64))
}

/// Read `numReturned` (or `context.returned`) from a raw page, falling back
/// to the number of features.
pub fn page_returned(page: &Value) -> u64 {
    page.get("numReturned")
        .and_then(Value::as_u64)
        .or_else(|| page.pointer("/context/returned").and_then(Value::as_u64))
        .unwrap_or_else(|| {
            page.get("features")
                .and_then(Value::as_array)
                .map_or(0, |f| f.len() as u64)
        })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    pub key: Value,
    #[serde(default)]
    pub frequency: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregation {
    pub name: String,
    #[serde(default)]
    pub buckets: Vec<Bucket>,
}

/// Response of the STAC API aggregation extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationResponse {
    #[serde(default)]
    pub aggregations: Vec<Aggregation>,
}

impl AggregationResponse {
    /// Aggregation name to bucket keys.
    pub fn bucket_keys(&self) -> IndexMap<String, Vec<Value>> {
        self.aggregations
            .iter()
            .map(|a| {
                (
                    a.name.clone(),
                    a.buckets.iter().map(|b| b.key.clone()).collect(),
                )
            })
            .collect()
    }
}

//! Structural validation of STAC documents.
//!
//! Checks the fields STAC core marks as required for catalogs, collections
//! and items. Extension schemas are not fetched.

use crate::client::{SearchParams, StacClient};
use crate::error::Result;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// `catalog`, `collection <id>` or `item <id>`.
    pub object: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.object, self.message)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub objects_checked: usize,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    fn record(&mut self, object: String, problems: Vec<String>) {
        self.objects_checked += 1;
        self.violations.extend(problems.into_iter().map(|message| Violation {
            object: object.clone(),
            message,
        }));
    }
}

fn require_string(doc: &Value, key: &str, problems: &mut Vec<String>) {
    match doc.get(key) {
        Some(Value::String(_)) => {}
        Some(_) => problems.push(format!("'{}' must be a string", key)),
        None => problems.push(format!("missing '{}'", key)),
    }
}

fn require_type(doc: &Value, expected: &str, problems: &mut Vec<String>) {
    match doc.get("type").and_then(Value::as_str) {
        Some(t) if t == expected => {}
        Some(t) => problems.push(format!("'type' is '{}', expected '{}'", t, expected)),
        None => problems.push("missing 'type'".to_string()),
    }
}

fn check_links(doc: &Value, problems: &mut Vec<String>) {
    match doc.get("links") {
        Some(Value::Array(links)) => {
            for (i, link) in links.iter().enumerate() {
                for key in ["rel", "href"] {
                    if link.get(key).and_then(Value::as_str).is_none() {
                        problems.push(format!("links[{}] is missing '{}'", i, key));
                    }
                }
            }
        }
        Some(_) => problems.push("'links' must be an array".to_string()),
        None => problems.push("missing 'links'".to_string()),
    }
}

fn check_extensions(doc: &Value, problems: &mut Vec<String>) {
    if let Some(ext) = doc.get("stac_extensions") {
        let all_strings = ext
            .as_array()
            .is_some_and(|a| a.iter().all(Value::is_string));
        if !all_strings {
            problems.push("'stac_extensions' must be an array of URLs".to_string());
        }
    }
}

pub fn validate_catalog(doc: &Value) -> Vec<String> {
    let mut problems = Vec::new();
    require_type(doc, "Catalog", &mut problems);
    for key in ["stac_version", "id", "description"] {
        require_string(doc, key, &mut problems);
    }
    check_links(doc, &mut problems);
    check_extensions(doc, &mut problems);
    problems
}

pub fn validate_collection(doc: &Value) -> Vec<String> {
    let mut problems = Vec::new();
    require_type(doc, "Collection", &mut problems);
    for key in ["stac_version", "id", "description", "license"] {
        require_string(doc, key, &mut problems);
    }
    match doc.get("extent") {
        Some(extent) => {
            if !extent.pointer("/spatial/bbox").is_some_and(Value::is_array) {
                problems.push("'extent.spatial.bbox' must be an array".to_string());
            }
            if !extent
                .pointer("/temporal/interval")
                .is_some_and(Value::is_array)
            {
                problems.push("'extent.temporal.interval' must be an array".to_string());
            }
        }
        None => problems.push("missing 'extent'".to_string()),
    }
    check_links(doc, &mut problems);
    check_extensions(doc, &mut problems);
    problems
}

pub fn validate_item(doc: &Value) -> Vec<String> {
    let mut problems = Vec::new();
    require_type(doc, "Feature", &mut problems);
    for key in ["stac_version", "id"] {
        require_string(doc, key, &mut problems);
    }
    match doc.get("geometry") {
        None => problems.push("missing 'geometry'".to_string()),
        Some(Value::Null) => {}
        Some(_) => {
            if !doc.get("bbox").is_some_and(Value::is_array) {
                problems.push("'bbox' is required when 'geometry' is set".to_string());
            }
        }
    }
    match doc.get("properties").and_then(Value::as_object) {
        Some(props) => {
            let has_datetime = props.contains_key("datetime")
                || (props.contains_key("start_datetime") && props.contains_key("end_datetime"));
            if !has_datetime {
                problems.push(
                    "properties need 'datetime' or 'start_datetime' and 'end_datetime'".to_string(),
                );
            }
        }
        None => problems.push("'properties' must be an object".to_string()),
    }
    match doc.get("assets").and_then(Value::as_object) {
        Some(assets) => {
            for (key, asset) in assets {
                if asset.get("href").and_then(Value::as_str).is_none() {
                    problems.push(format!("asset '{}' is missing 'href'", key));
                }
            }
        }
        None => problems.push("'assets' must be an object".to_string()),
    }
    check_links(doc, &mut problems);
    check_extensions(doc, &mut problems);
    problems
}

fn object_id(doc: &Value) -> &str {
    doc.get("id").and_then(Value::as_str).unwrap_or("<no id>")
}

/// Validate the landing catalog, every collection and up to `max_items`
/// items of each collection.
pub async fn validate_all(client: &StacClient, max_items: usize) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();

    let landing = client.get_json(client.root()).await?;
    report.record("catalog".to_string(), validate_catalog(&landing));

    for collection in client.collection_values().await? {
        let id = object_id(&collection).to_string();
        report.record(format!("collection {}", id), validate_collection(&collection));

        if max_items == 0 {
            continue;
        }
        let items = client
            .search(SearchParams::new().collections([id.clone()]).max_items(max_items))?
            .item_collection_as_value()
            .await?;
        for item in items["features"].as_array().into_iter().flatten() {
            report.record(format!("item {}", object_id(item)), validate_item(item));
        }
    }

    tracing::debug!(
        endpoint = client.root(),
        checked = report.objects_checked,
        violations = report.violations.len(),
        "Validated catalog"
    );
    Ok(report)
}

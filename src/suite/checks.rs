use super::{Case, CaseParams, Check};
use crate::client::{aggregate_url, SearchParams, StacClient};
use crate::error::StacError;
use crate::profile::Expectations;
use crate::query::{Filter, TimeFilterMethod, TimeRange};
use crate::scenarios::{
    rsus_rsds_filter, volmip_filter, CMIP6_COLLECTION, FACET_AGGREGATIONS, FIRST_DATA_ASSET,
    NETCDF_MEDIA_TYPE, PUBLISHED_CMIP6_SCHEMA_URL, SUPPORTED_COLLECTIONS,
};
use crate::types::{page_matched, page_returned, AggregationResponse};
use crate::validate::validate_all;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// How a check failed: an assertion about the service's answer, or an
/// error before an answer could be judged.
#[derive(Debug, Clone)]
pub enum CheckFailure {
    Assertion(String),
    Error(StacError),
}

impl From<StacError> for CheckFailure {
    fn from(e: StacError) -> Self {
        CheckFailure::Error(e)
    }
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckFailure::Assertion(msg) => f.write_str(msg),
            CheckFailure::Error(e) => write!(f, "{}", e),
        }
    }
}

pub type CheckResult = std::result::Result<(), CheckFailure>;

macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err(CheckFailure::Assertion(format!($($arg)+)));
        }
    };
}

/// Shared state handed to every case.
#[derive(Clone)]
pub struct CheckContext {
    pub http: reqwest::Client,
    pub expectations: Arc<dyn Expectations>,
}

impl CheckContext {
    async fn open(&self, endpoint: &str) -> Result<StacClient, StacError> {
        StacClient::open_with(endpoint, self.http.clone()).await
    }
}

fn cmip6_search() -> SearchParams {
    SearchParams::new().collections([CMIP6_COLLECTION])
}

pub async fn run_case(case: &Case, ctx: &CheckContext) -> CheckResult {
    let endpoint = case.endpoint.as_str();
    match (&case.check, &case.params) {
        (Check::SearchingWithFilters, CaseParams::FilterScenario { name, filter }) => {
            searching_with_filters(ctx, endpoint, name, filter).await
        }
        (Check::Cmip6TemporalQuery, CaseParams::Temporal { range, method }) => {
            cmip6_temporal_query(ctx, endpoint, range, *method).await
        }
        (Check::AssetsIncludeFileExtensionAttributes, CaseParams::None) => {
            assets_include_file_extension_attributes(ctx, endpoint).await
        }
        (Check::Pagination, CaseParams::None) => pagination(ctx, endpoint).await,
        (Check::ValidateCatalog, CaseParams::None) => validate_catalog(ctx, endpoint).await,
        (Check::EndpointUsesPublishedCmip6Extension, CaseParams::None) => {
            endpoint_uses_published_cmip6_extension(ctx, endpoint).await
        }
        (Check::Cmip6CollectionGeospatialExtent, CaseParams::None) => {
            cmip6_collection_geospatial_extent(ctx, endpoint).await
        }
        (Check::Collections, CaseParams::None) => collections(ctx, endpoint).await,
        (Check::ItemContent, CaseParams::None) => item_content(ctx, endpoint).await,
        (Check::FacetCounts, CaseParams::None) => facet_counts(ctx, endpoint).await,
        (check, params) => Err(CheckFailure::Error(StacError::Config(format!(
            "{} cannot run with parameters {:?}",
            check, params
        )))),
    }
}

async fn searching_with_filters(
    ctx: &CheckContext,
    endpoint: &str,
    scenario: &str,
    filter: &Filter,
) -> CheckResult {
    let expected = ctx.expectations.expected_result_count(scenario)?;
    let client = ctx.open(endpoint).await?;
    let mut pages = client
        .search(cmip6_search().filter(filter.clone()))?
        .pages_as_values()?;
    let first = pages
        .next_page()
        .await?
        .ok_or_else(|| CheckFailure::Assertion("search returned no pages".to_string()))?;
    let matched = page_matched(&first)
        .ok_or_else(|| CheckFailure::Assertion("first page has no numMatched".to_string()))?;
    ensure!(
        expected.matches(matched),
        "numMatched for '{}' was {}, expected {}",
        scenario,
        matched,
        expected
    );
    Ok(())
}

async fn assets_include_file_extension_attributes(
    ctx: &CheckContext,
    endpoint: &str,
) -> CheckResult {
    let client = ctx.open(endpoint).await?;
    let mut pages = client
        .search(cmip6_search().filter(rsus_rsds_filter()))?
        .pages_as_values()?;
    let first = pages
        .next_item_collection()
        .await?
        .ok_or_else(|| CheckFailure::Assertion("search returned no pages".to_string()))?;
    let item = first
        .features
        .first()
        .ok_or_else(|| CheckFailure::Assertion("first page has no items".to_string()))?;

    let netcdf = item.assets_with_media_type(NETCDF_MEDIA_TYPE);
    let asset = netcdf.get(FIRST_DATA_ASSET).ok_or_else(|| {
        CheckFailure::Assertion(format!(
            "item {} has no '{}' asset of type {} (NetCDF assets: {:?})",
            item.id,
            FIRST_DATA_ASSET,
            NETCDF_MEDIA_TYPE,
            netcdf.keys().collect::<Vec<_>>()
        ))
    })?;

    for field in ["file:size", "file:checksum"] {
        ensure!(
            asset.extra_fields.contains_key(field),
            "asset '{}' of item {} is missing '{}'",
            FIRST_DATA_ASSET,
            item.id,
            field
        );
    }
    Ok(())
}

/// Pages expected after the first one: `matched / returned`, rounded down.
/// A service may end a search whose match count is an exact multiple of the
/// page size with one empty page, and that page is counted.
///
/// `None` when the first page is empty although something matched, so no
/// page size can be derived.
pub fn expected_remaining_pages(matched: u64, returned: u64) -> Option<u64> {
    match (matched, returned) {
        (0, _) => Some(0),
        (_, 0) => None,
        (m, r) => Some(m / r),
    }
}

async fn pagination(ctx: &CheckContext, endpoint: &str) -> CheckResult {
    let client = ctx.open(endpoint).await?;
    let mut pages = client
        .search(cmip6_search().filter(rsus_rsds_filter()))?
        .pages_as_values()?;
    let first = pages
        .next_page()
        .await?
        .ok_or_else(|| CheckFailure::Assertion("search returned no pages".to_string()))?;
    let matched = page_matched(&first)
        .ok_or_else(|| CheckFailure::Assertion("first page has no numMatched".to_string()))?;
    let returned = page_returned(&first);
    let expected = expected_remaining_pages(matched, returned).ok_or_else(|| {
        CheckFailure::Assertion(format!(
            "first page returned no items although {} matched",
            matched
        ))
    })?;

    let mut remaining = 0u64;
    while pages.next_page().await?.is_some() {
        remaining += 1;
    }

    tracing::debug!(
        endpoint,
        matched,
        returned,
        expected_remaining = expected,
        actual_pages = remaining + 1,
        "Paged through search"
    );
    ensure!(
        remaining == expected,
        "expected {} pages after the first ({} matched, {} per page), got {}",
        expected,
        matched,
        returned,
        remaining
    );
    Ok(())
}

async fn validate_catalog(ctx: &CheckContext, endpoint: &str) -> CheckResult {
    let client = ctx.open(endpoint).await?;
    let report = validate_all(&client, 1).await?;
    ensure!(
        report.is_valid(),
        "{} STAC violations, first: {}",
        report.violations.len(),
        report
            .violations
            .iter()
            .take(5)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    );
    Ok(())
}

/// JSON pointers at which two documents differ, up to `limit` of them.
pub fn json_differences(left: &Value, right: &Value, limit: usize) -> Vec<String> {
    fn walk(left: &Value, right: &Value, path: &str, limit: usize, out: &mut Vec<String>) {
        if out.len() >= limit || left == right {
            return;
        }
        match (left, right) {
            (Value::Object(l), Value::Object(r)) => {
                for key in l.keys().chain(r.keys().filter(|k| !l.contains_key(*k))) {
                    let child = format!("{}/{}", path, key);
                    match (l.get(key), r.get(key)) {
                        (Some(a), Some(b)) => walk(a, b, &child, limit, out),
                        _ => out.push(child),
                    }
                    if out.len() >= limit {
                        return;
                    }
                }
            }
            (Value::Array(l), Value::Array(r)) if l.len() == r.len() => {
                for (i, (a, b)) in l.iter().zip(r).enumerate() {
                    walk(a, b, &format!("{}/{}", path, i), limit, out);
                }
            }
            _ => out.push(if path.is_empty() { "/".to_string() } else { path.to_string() }),
        }
    }

    let mut out = Vec::new();
    walk(left, right, "", limit, &mut out);
    out
}

async fn endpoint_uses_published_cmip6_extension(
    ctx: &CheckContext,
    endpoint: &str,
) -> CheckResult {
    let client = ctx.open(endpoint).await?;
    let collection = client
        .search(cmip6_search().max_items(1))?
        .item_collection_as_value()
        .await?;
    let item = collection["features"]
        .get(0)
        .ok_or_else(|| CheckFailure::Assertion("search returned no items".to_string()))?;
    let extensions: Vec<&str> = item["stac_extensions"]
        .as_array()
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if extensions.contains(&PUBLISHED_CMIP6_SCHEMA_URL) {
        return Ok(());
    }

    let cmip6: Vec<&str> = extensions
        .iter()
        .copied()
        .filter(|url| url.contains("cmip6"))
        .collect();
    ensure!(!cmip6.is_empty(), "No CMIP6 STAC extension found.");
    ensure!(
        cmip6.len() == 1,
        "Multiple possible cmip6 extensions found: {:?}",
        cmip6
    );

    let published = client.get_json(PUBLISHED_CMIP6_SCHEMA_URL).await?;
    let used = client.get_json(cmip6[0]).await?;
    let diff = json_differences(&used, &published, 10);
    ensure!(
        diff.is_empty(),
        "{} differs from the published schema at {}",
        cmip6[0],
        diff.join(", ")
    );
    Ok(())
}

async fn cmip6_collection_geospatial_extent(ctx: &CheckContext, endpoint: &str) -> CheckResult {
    let client = ctx.open(endpoint).await?;
    let collection = client.get_collection(CMIP6_COLLECTION).await?;
    let extent = collection
        .extent
        .map(|e| e.to_value())
        .unwrap_or(Value::Null);

    ensure!(
        extent.as_object().is_some_and(|o| !o.is_empty()),
        "collection {} has no extent",
        CMIP6_COLLECTION
    );
    ensure!(extent.get("spatial").is_some(), "extent has no 'spatial'");
    ensure!(extent.get("temporal").is_some(), "extent has no 'temporal'");
    ensure!(
        extent["spatial"].get("bbox").is_some(),
        "spatial extent has no 'bbox'"
    );
    ensure!(
        extent["temporal"].get("interval").is_some(),
        "temporal extent has no 'interval'"
    );
    Ok(())
}

async fn collections(ctx: &CheckContext, endpoint: &str) -> CheckResult {
    let client = ctx.open(endpoint).await?;
    let ids: Vec<String> = client
        .get_collections()
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    let missing: Vec<&str> = SUPPORTED_COLLECTIONS
        .iter()
        .copied()
        .filter(|id| !ids.iter().any(|have| have == id))
        .collect();
    ensure!(
        missing.is_empty(),
        "missing collections {:?} (listed: {:?})",
        missing,
        ids
    );
    Ok(())
}

async fn cmip6_temporal_query(
    ctx: &CheckContext,
    endpoint: &str,
    range: &TimeRange,
    method: TimeFilterMethod,
) -> CheckResult {
    let client = ctx.open(endpoint).await?;
    let params = method.apply(range, cmip6_search().max_items(1));
    let items = client.search(params)?.items().await?;
    ensure!(
        !items.is_empty(),
        "no items found for {} using {}",
        range.interval(),
        method
    );
    Ok(())
}

async fn item_content(ctx: &CheckContext, endpoint: &str) -> CheckResult {
    let client = ctx.open(endpoint).await?;
    let items = client.search(cmip6_search().max_items(1))?.items().await?;
    let item = items
        .first()
        .ok_or_else(|| CheckFailure::Assertion("search returned no items".to_string()))?;
    let nc_assets: Vec<&str> = item
        .assets
        .values()
        .map(|a| a.href.as_str())
        .filter(|href| href.ends_with(".nc"))
        .collect();
    ensure!(
        !nc_assets.is_empty(),
        "item {} has no asset ending in .nc",
        item.id
    );
    ensure!(!nc_assets[0].is_empty(), "item {} has an empty asset href", item.id);
    Ok(())
}

async fn facet_counts(ctx: &CheckContext, endpoint: &str) -> CheckResult {
    let client = ctx.open(endpoint).await?;
    let search = client.search(cmip6_search().filter(volmip_filter()))?;
    let url = aggregate_url(&search.url_with_parameters()?, &FACET_AGGREGATIONS)?;
    let content = client.get_json(url.as_str()).await?;
    let response: AggregationResponse = serde_json::from_value(content).map_err(StacError::from)?;
    let buckets = response.bucket_keys();

    for name in FACET_AGGREGATIONS {
        let keys = buckets.get(name).ok_or_else(|| {
            CheckFailure::Assertion(format!(
                "aggregation '{}' missing (got {:?})",
                name,
                buckets.keys().collect::<Vec<_>>()
            ))
        })?;
        let expected = ctx.expectations.expected_facet_buckets(name);
        ensure!(
            expected.matches(keys.len() as u64),
            "aggregation '{}' has {} buckets, expected {}",
            name,
            keys.len(),
            expected
        );
    }
    Ok(())
}

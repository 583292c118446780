//! Static data the checks are parametrized over.

use crate::error::Result;
use crate::query::{Filter, TimeRange};
use indexmap::IndexMap;
use once_cell::sync::Lazy;

pub const DEFAULT_STAC_ENDPOINTS: [&str; 2] = [
    "https://api.stac.esgf.ceda.ac.uk",
    "https://data-challenge-04-discovery.api.stac.esgf-west.org",
];

pub const CMIP6_COLLECTION: &str = "CMIP6";

/// Collections every endpoint must list.
pub const SUPPORTED_COLLECTIONS: [&str; 1] = [CMIP6_COLLECTION];

/// Date ranges checked by the temporal query check, as `(start, end)`.
pub const TIME_RANGES: [(&str, &str); 1] = [("1850-01-01", "2020-01-01")];

pub const PUBLISHED_CMIP6_SCHEMA_URL: &str =
    "https://stac-extensions.github.io/cmip6/v2.0.0/schema.json";

pub const NETCDF_MEDIA_TYPE: &str = "application/netcdf";

/// Asset key of the first data file of a CMIP6 item.
pub const FIRST_DATA_ASSET: &str = "data0001";

pub const FACET_AGGREGATIONS: [&str; 2] =
    ["cmip6_source_id_frequency", "cmip6_table_id_frequency"];

const VARIABLE_ID: &str = "properties.cmip6:variable_id";

/// Named CQL2 filter scenarios, in reporting order.
pub static FILTER_SCENARIOS: Lazy<IndexMap<String, Filter>> = Lazy::new(|| {
    let mut scenarios = IndexMap::new();
    scenarios.insert(
        "var_id_eq_rsus_rsds".to_string(),
        Filter::Or(vec![
            Filter::eq(VARIABLE_ID, "rsus"),
            Filter::eq(VARIABLE_ID, "rsds"),
        ]),
    );
    scenarios.insert("var_id_in_rsus_rsds".to_string(), rsus_rsds_filter());
    scenarios.insert(
        "var_id_tas_source_id_MIROC6".to_string(),
        Filter::And(vec![
            Filter::eq(VARIABLE_ID, "tas"),
            Filter::eq("properties.cmip6:source_id", "MIROC6"),
        ]),
    );
    scenarios.insert(
        "member_id_eq_r2i1p1f1".to_string(),
        Filter::eq("properties.cmip6:member_id", "r2i1p1f1"),
    );
    scenarios.insert(
        "variant_label_eq_r2i1p1f1".to_string(),
        Filter::eq("properties.cmip6:variant_label", "r2i1p1f1"),
    );
    scenarios
});

/// `variable_id in [rsus, rsds]`, used by the asset and paging checks.
pub fn rsus_rsds_filter() -> Filter {
    Filter::is_in(VARIABLE_ID, ["rsus", "rsds"])
}

/// `activity_id = VolMIP`, used by the facet check.
pub fn volmip_filter() -> Filter {
    Filter::eq("properties.cmip6:activity_id", "VolMIP")
}

pub fn time_ranges() -> Result<Vec<TimeRange>> {
    parse_time_ranges(&TIME_RANGES)
}

/// Parse `(start, end)` date pairs, failing on the first malformed one.
pub fn parse_time_ranges(pairs: &[(&str, &str)]) -> Result<Vec<TimeRange>> {
    pairs
        .iter()
        .map(|(start, end)| TimeRange::parse(start, end))
        .collect()
}

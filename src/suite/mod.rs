//! Conformance checks and their parametrization.
//!
//! Every [`Check`] runs once per endpoint. Some are further parametrized: the
//! filter check over every named filter scenario, the temporal check over
//! every time range and time-filter method. [`collect`] expands the cross
//! product into [`Case`]s and applies keyword/marker selection.

pub mod checks;
pub mod report;
pub mod runner;

pub use checks::{run_case, CheckContext};
pub use report::{CaseResult, FailureKind, Outcome, Report, Summary};
pub use runner::Runner;

use crate::config::SuiteConfig;
use crate::error::{Result, StacError};
use crate::query::{Filter, TimeFilterMethod, TimeRange};
use crate::scenarios;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    SearchingWithFilters,
    AssetsIncludeFileExtensionAttributes,
    Pagination,
    ValidateCatalog,
    EndpointUsesPublishedCmip6Extension,
    Cmip6CollectionGeospatialExtent,
    Collections,
    Cmip6TemporalQuery,
    ItemContent,
    FacetCounts,
}

impl Check {
    pub const ALL: [Check; 10] = [
        Check::SearchingWithFilters,
        Check::AssetsIncludeFileExtensionAttributes,
        Check::Pagination,
        Check::ValidateCatalog,
        Check::EndpointUsesPublishedCmip6Extension,
        Check::Cmip6CollectionGeospatialExtent,
        Check::Collections,
        Check::Cmip6TemporalQuery,
        Check::ItemContent,
        Check::FacetCounts,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Check::SearchingWithFilters => "searching_with_filters",
            Check::AssetsIncludeFileExtensionAttributes => {
                "assets_include_file_extension_attributes"
            }
            Check::Pagination => "pagination",
            Check::ValidateCatalog => "validate_catalog",
            Check::EndpointUsesPublishedCmip6Extension => "endpoint_uses_published_cmip6_extension",
            Check::Cmip6CollectionGeospatialExtent => "cmip6_collection_geospatial_extent",
            Check::Collections => "collections",
            Check::Cmip6TemporalQuery => "cmip6_temporal_query",
            Check::ItemContent => "item_content",
            Check::FacetCounts => "facet_counts",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Check::SearchingWithFilters => "Filtered searches return the expected number of matches",
            Check::AssetsIncludeFileExtensionAttributes => {
                "Item assets carry file:size and file:checksum from the file extension"
            }
            Check::Pagination => "All results can be retrieved by paging through them",
            Check::ValidateCatalog => "Catalog, collections and items are valid STAC",
            Check::EndpointUsesPublishedCmip6Extension => {
                "Items use the published CMIP6 STAC extension"
            }
            Check::Cmip6CollectionGeospatialExtent => {
                "The CMIP6 collection declares spatial and temporal extents"
            }
            Check::Collections => "Every supported collection is listed",
            Check::Cmip6TemporalQuery => "Items can be found by a time filter",
            Check::ItemContent => "Items expose a NetCDF asset URL",
            Check::FacetCounts => "The aggregation endpoint returns facet buckets",
        }
    }

    pub fn markers(&self) -> Vec<Marker> {
        match self {
            Check::SearchingWithFilters | Check::FacetCounts => {
                vec![Marker::NeededFor("metagrid".to_string())]
            }
            Check::AssetsIncludeFileExtensionAttributes | Check::ItemContent => {
                vec![Marker::NeededFor("esmvaltool".to_string())]
            }
            Check::Pagination => vec![Marker::Timeout(Duration::from_secs(60))],
            Check::ValidateCatalog => vec![Marker::Xfail(
                "CMIP6 STAC extension used is not public".to_string(),
            )],
            Check::EndpointUsesPublishedCmip6Extension => {
                vec![Marker::Xfail("Temporary design decision".to_string())]
            }
            Check::Cmip6CollectionGeospatialExtent
            | Check::Collections
            | Check::Cmip6TemporalQuery => Vec::new(),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// Expected to fail everywhere.
    Xfail(String),
    /// Expected to fail only while the given data challenge is active.
    DataChallengeXfail { id: u8, reason: String },
    /// Only meaningful for the given data challenge; skipped otherwise.
    DataChallenge(u8),
    /// Functionality a downstream client depends on.
    NeededFor(String),
    Timeout(Duration),
}

impl Marker {
    pub fn name(&self) -> &'static str {
        match self {
            Marker::Xfail(_) => "xfail",
            Marker::DataChallengeXfail { .. } => "data_challenge_xfail",
            Marker::DataChallenge(_) => "data_challenge",
            Marker::NeededFor(_) => "needed_for",
            Marker::Timeout(_) => "timeout",
        }
    }

    fn value(&self) -> Option<String> {
        match self {
            Marker::Xfail(_) => None,
            Marker::DataChallengeXfail { id, .. } | Marker::DataChallenge(id) => {
                Some(id.to_string())
            }
            Marker::NeededFor(client) => Some(client.clone()),
            Marker::Timeout(d) => Some(d.as_secs().to_string()),
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(v) => write!(f, "{}({})", self.name(), v),
            None => f.write_str(self.name()),
        }
    }
}

/// What to do with a case given its markers and the active data challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Run { xfail: Option<String> },
    Skip(String),
}

pub fn resolve_markers(markers: &[Marker], data_challenge: u8) -> Disposition {
    let mut xfail = None;
    for marker in markers {
        match marker {
            Marker::DataChallenge(id) if *id != data_challenge => {
                return Disposition::Skip(format!("only runs for Data Challenge {}", id));
            }
            Marker::Xfail(reason) => xfail = Some(reason.clone()),
            Marker::DataChallengeXfail { id, reason } if *id == data_challenge => {
                xfail = Some(reason.clone())
            }
            _ => {}
        }
    }
    Disposition::Run { xfail }
}

pub fn timeout_marker(markers: &[Marker]) -> Option<Duration> {
    markers.iter().find_map(|m| match m {
        Marker::Timeout(d) => Some(*d),
        _ => None,
    })
}

/// `-m` selection: `name`, `name=value`, optionally prefixed with `not `.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSelector {
    negated: bool,
    name: String,
    value: Option<String>,
}

impl MarkerSelector {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (negated, rest) = match raw.strip_prefix("not ") {
            Some(rest) => (true, rest.trim()),
            None => (false, raw),
        };
        let (name, value) = match rest.split_once('=') {
            Some((n, v)) => (n.trim(), Some(v.trim().to_string())),
            None => (rest, None),
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(StacError::Config(format!("invalid marker expression '{}'", raw)));
        }
        Ok(Self {
            negated,
            name: name.to_string(),
            value,
        })
    }

    pub fn matches(&self, markers: &[Marker]) -> bool {
        let hit = markers.iter().any(|m| {
            m.name() == self.name
                && match &self.value {
                    Some(v) => m.value().as_deref() == Some(v.as_str()),
                    None => true,
                }
        });
        hit != self.negated
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseParams {
    None,
    FilterScenario { name: String, filter: Filter },
    Temporal {
        range: TimeRange,
        method: TimeFilterMethod,
    },
}

/// One check bound to one endpoint and one parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub check: Check,
    pub endpoint: String,
    pub params: CaseParams,
}

impl Case {
    pub fn id(&self) -> String {
        let mut parts = vec![self.endpoint.clone()];
        match &self.params {
            CaseParams::None => {}
            CaseParams::FilterScenario { name, .. } => parts.push(name.clone()),
            CaseParams::Temporal { range, method } => {
                parts.push(range.to_string());
                parts.push(method.to_string());
            }
        }
        format!("{}[{}]", self.check.name(), parts.join("-"))
    }

    pub fn markers(&self) -> Vec<Marker> {
        self.check.markers()
    }
}

fn params_for(check: Check, config: &SuiteConfig) -> Result<Vec<CaseParams>> {
    let params = match check {
        Check::SearchingWithFilters => config
            .filter_scenarios
            .iter()
            .map(|(name, filter)| CaseParams::FilterScenario {
                name: name.clone(),
                filter: filter.clone(),
            })
            .collect(),
        Check::Cmip6TemporalQuery => scenarios::time_ranges()?
            .into_iter()
            .flat_map(|range| {
                TimeFilterMethod::ALL
                    .into_iter()
                    .map(move |method| CaseParams::Temporal { range, method })
            })
            .collect(),
        _ => vec![CaseParams::None],
    };
    Ok(params)
}

/// Expand checks × endpoints × parameters, then apply `-k` and `-m`.
pub fn collect(config: &SuiteConfig) -> Result<Vec<Case>> {
    let selector = config
        .marker
        .as_deref()
        .map(MarkerSelector::parse)
        .transpose()?;

    let mut cases = Vec::new();
    for check in Check::ALL {
        for params in params_for(check, config)? {
            for endpoint in &config.endpoints {
                cases.push(Case {
                    check,
                    endpoint: endpoint.clone(),
                    params: params.clone(),
                });
            }
        }
    }

    let total = cases.len();
    cases.retain(|case| {
        let keyword_ok = config
            .keyword
            .as_deref()
            .map_or(true, |k| case.id().contains(k));
        let marker_ok = selector
            .as_ref()
            .map_or(true, |s| s.matches(&case.markers()));
        keyword_ok && marker_ok
    });
    tracing::debug!(collected = total, selected = cases.len(), "Collected cases");
    Ok(cases)
}

use crate::client::{normalize_endpoint, ClientOptions};
use crate::error::{Result, StacError};
use crate::profile::{profile_for, Expectations};
use crate::query::Filter;
use crate::scenarios::{DEFAULT_STAC_ENDPOINTS, FILTER_SCENARIOS};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const ENV_ENDPOINTS: &str = "ESGF_STAC_ENDPOINTS";
pub const ENV_DATA_CHALLENGE: &str = "ESGF_STAC_DATA_CHALLENGE";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CASE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_JOBS: usize = 4;

/// Optional JSON config file, e.g.
///
/// ```json
/// {
///   "stac_endpoints": ["https://api.stac.esgf.ceda.ac.uk"],
///   "data_challenge": 4,
///   "filter_scenarios": {
///     "table_id_eq_Amon": {"op": "=", "args": [{"property": "properties.cmip6:table_id"}, "Amon"]}
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub stac_endpoints: Option<Vec<String>>,
    #[serde(default)]
    pub data_challenge: Option<u8>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
    #[serde(default)]
    pub case_timeout_secs: Option<u64>,
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Extra named filter scenarios appended after the built-in ones.
    #[serde(default)]
    pub filter_scenarios: IndexMap<String, Filter>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StacError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config: FileConfig = serde_json::from_str(&content)
            .map_err(|e| StacError::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        tracing::info!(
            path = %path.display(),
            endpoints = config.stac_endpoints.as_ref().map_or(0, Vec::len),
            extra_scenarios = config.filter_scenarios.len(),
            "Loaded config file"
        );
        Ok(config)
    }
}

/// Values given on the command line or through the environment. Anything
/// left `None` falls back to the config file, then to built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoints: Option<Vec<String>>,
    pub data_challenge: Option<u8>,
    pub http_timeout_secs: Option<u64>,
    pub case_timeout_secs: Option<u64>,
    pub jobs: Option<usize>,
    pub keyword: Option<String>,
    pub marker: Option<String>,
}

impl ConfigOverrides {
    /// Read `ESGF_STAC_ENDPOINTS` (comma separated) and
    /// `ESGF_STAC_DATA_CHALLENGE`.
    pub fn from_env() -> Result<Self> {
        let endpoints = std::env::var(ENV_ENDPOINTS)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| split_endpoint_list(&v));
        let data_challenge = match std::env::var(ENV_DATA_CHALLENGE) {
            Ok(v) if !v.trim().is_empty() => Some(v.trim().parse().map_err(|_| {
                StacError::Config(format!("{} must be an integer, got '{}'", ENV_DATA_CHALLENGE, v))
            })?),
            _ => None,
        };
        Ok(Self {
            endpoints,
            data_challenge,
            ..Self::default()
        })
    }
}

/// Split a comma separated endpoint list, dropping empty entries.
pub fn split_endpoint_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fully resolved settings for one run.
#[derive(Clone)]
pub struct SuiteConfig {
    pub endpoints: Vec<String>,
    pub data_challenge: u8,
    pub expectations: Arc<dyn Expectations>,
    pub client: ClientOptions,
    pub case_timeout: Duration,
    pub jobs: usize,
    pub keyword: Option<String>,
    pub marker: Option<String>,
    pub filter_scenarios: IndexMap<String, Filter>,
}

impl std::fmt::Debug for SuiteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuiteConfig")
            .field("endpoints", &self.endpoints)
            .field("data_challenge", &self.data_challenge)
            .field("client", &self.client)
            .field("case_timeout", &self.case_timeout)
            .field("jobs", &self.jobs)
            .field("keyword", &self.keyword)
            .field("marker", &self.marker)
            .field("filter_scenarios", &self.filter_scenarios.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SuiteConfig {
    /// Merge overrides over the config file over defaults and validate the
    /// result.
    ///
    /// # Errors
    /// Returns [`StacError::InvalidEndpoint`] for malformed endpoints,
    /// [`StacError::UnknownDataChallenge`] for challenges without a profile
    /// and [`StacError::Config`] for empty endpoint lists, `jobs == 0` or
    /// scenario names that shadow built-in ones.
    pub fn resolve(overrides: ConfigOverrides, file: Option<FileConfig>) -> Result<Self> {
        let file = file.unwrap_or_default();

        let raw_endpoints = overrides
            .endpoints
            .or(file.stac_endpoints)
            .unwrap_or_else(|| DEFAULT_STAC_ENDPOINTS.iter().map(|s| s.to_string()).collect());
        let mut endpoints: Vec<String> = Vec::with_capacity(raw_endpoints.len());
        for raw in &raw_endpoints {
            let normalized = normalize_endpoint(raw)?;
            if !endpoints.contains(&normalized) {
                endpoints.push(normalized);
            }
        }
        if endpoints.is_empty() {
            return Err(StacError::Config("no STAC endpoints configured".to_string()));
        }

        let data_challenge = overrides.data_challenge.or(file.data_challenge).unwrap_or(0);
        let expectations = profile_for(data_challenge)?;

        let jobs = overrides.jobs.or(file.jobs).unwrap_or(DEFAULT_JOBS);
        if jobs == 0 {
            return Err(StacError::Config("jobs must be at least 1".to_string()));
        }

        let http_timeout = overrides
            .http_timeout_secs
            .or(file.http_timeout_secs)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        let case_timeout = overrides
            .case_timeout_secs
            .or(file.case_timeout_secs)
            .unwrap_or(DEFAULT_CASE_TIMEOUT_SECS);

        let mut filter_scenarios = IndexMap::clone(&FILTER_SCENARIOS);
        for (name, filter) in file.filter_scenarios {
            if filter_scenarios.contains_key(&name) {
                return Err(StacError::Config(format!(
                    "filter scenario '{}' shadows a built-in scenario",
                    name
                )));
            }
            filter_scenarios.insert(name, filter);
        }

        Ok(Self {
            endpoints,
            data_challenge,
            expectations,
            client: ClientOptions {
                timeout: Duration::from_secs(http_timeout),
                ..ClientOptions::default()
            },
            case_timeout: Duration::from_secs(case_timeout),
            jobs,
            keyword: overrides.keyword.filter(|k| !k.is_empty()),
            marker: overrides.marker.filter(|m| !m.is_empty()),
            filter_scenarios,
        })
    }
}

//! # esgf-stac
//!
//! Conformance checks for ESGF STAC API deployments. Each check is run
//! against every configured endpoint, optionally with exact expectations
//! recorded for a data challenge, and the outcomes are gathered into a
//! [`Report`].
//!
//! The library can be driven directly, or through the `esgf-stac-tests`
//! binary in the companion `esgf-stac-runner` crate.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use esgf_stac::{ConfigOverrides, Runner, SuiteConfig};
//!
//! # async fn run() -> esgf_stac::Result<()> {
//! let overrides = ConfigOverrides {
//!     endpoints: Some(vec!["https://api.stac.esgf.ceda.ac.uk".to_string()]),
//!     data_challenge: Some(4),
//!     ..Default::default()
//! };
//! let runner = Runner::new(SuiteConfig::resolve(overrides, None)?)?;
//! let cases = runner.collect()?;
//! let report = runner.run(cases).await;
//! print!("{}", report.render_text(false));
//! std::process::exit(report.exit_code() as i32);
//! # }
//! ```
//!
//! ## Using the client on its own
//!
//! ```rust,no_run
//! use esgf_stac::client::{ClientOptions, SearchParams, StacClient};
//! use esgf_stac::query::Filter;
//!
//! # async fn search() -> esgf_stac::Result<()> {
//! let client = StacClient::open("api.stac.esgf.ceda.ac.uk", &ClientOptions::default()).await?;
//! let items = client
//!     .search(
//!         SearchParams::new()
//!             .collections(["CMIP6"])
//!             .filter(Filter::eq("properties.cmip6:variable_id", "tas"))
//!             .max_items(5),
//!     )?
//!     .items()
//!     .await?;
//! println!("Found {} items", items.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod profile;
pub mod query;
pub mod scenarios;
pub mod suite;
pub mod types;
pub mod validate;

pub use client::{ClientOptions, StacClient};
pub use config::{ConfigOverrides, FileConfig, SuiteConfig};
pub use error::{Result, StacError};
pub use profile::{profile_for, Expectations, ExpectedCount};
pub use suite::{Case, Check, Outcome, Report, Runner, Summary};

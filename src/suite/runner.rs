use super::checks::{run_case, CheckContext, CheckFailure};
use super::report::{CaseResult, FailureKind, Outcome, Report};
use super::{collect, resolve_markers, timeout_marker, Case, Disposition};
use crate::client::build_http_client;
use crate::config::SuiteConfig;
use crate::error::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Runs collected cases with bounded concurrency and a per-case deadline.
pub struct Runner {
    config: SuiteConfig,
    ctx: CheckContext,
}

impl Runner {
    pub fn new(config: SuiteConfig) -> Result<Self> {
        let http = build_http_client(&config.client)?;
        let ctx = CheckContext {
            http,
            expectations: Arc::clone(&config.expectations),
        };
        Ok(Self { config, ctx })
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn collect(&self) -> Result<Vec<Case>> {
        collect(&self.config)
    }

    /// Run every case. Results come back in collection order whatever order
    /// the cases finish in.
    pub async fn run(&self, cases: Vec<Case>) -> Report {
        let started_at = Utc::now();
        let header = self.config.expectations.report_header();
        if let Some(header) = &header {
            tracing::info!("{}", header);
        }
        tracing::info!(
            cases = cases.len(),
            jobs = self.config.jobs,
            "Running conformance checks"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.jobs));
        let mut handles = Vec::with_capacity(cases.len());
        for case in cases {
            let semaphore = Arc::clone(&semaphore);
            let ctx = self.ctx.clone();
            let data_challenge = self.config.data_challenge;
            let default_timeout = self.config.case_timeout;
            let labels = (case.id(), case.check.name().to_string(), case.endpoint.clone());
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                run_one(&case, &ctx, data_challenge, default_timeout).await
            });
            handles.push((labels, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for ((id, check, endpoint), handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!(case = %id, error = %e, "Case task crashed");
                    results.push(CaseResult {
                        id,
                        check,
                        endpoint,
                        outcome: Outcome::Failed {
                            kind: FailureKind::Local,
                            message: format!("case task crashed: {}", e),
                        },
                        duration_ms: 0,
                    });
                }
            }
        }

        Report::new(self.config.data_challenge, header, started_at, results)
    }
}

async fn run_one(
    case: &Case,
    ctx: &CheckContext,
    data_challenge: u8,
    default_timeout: Duration,
) -> CaseResult {
    let id = case.id();
    let markers = case.markers();
    let started = Instant::now();

    let outcome = match resolve_markers(&markers, data_challenge) {
        Disposition::Skip(reason) => Outcome::Skipped { reason },
        Disposition::Run { xfail } => {
            let deadline = timeout_marker(&markers).unwrap_or(default_timeout);
            let failure = match tokio::time::timeout(deadline, run_case(case, ctx)).await {
                Ok(Ok(())) => None,
                Ok(Err(CheckFailure::Assertion(message))) => {
                    Some((FailureKind::Assertion, message))
                }
                Ok(Err(CheckFailure::Error(e))) => {
                    let kind = if e.is_remote() {
                        FailureKind::Remote
                    } else {
                        FailureKind::Local
                    };
                    Some((kind, e.to_string()))
                }
                Err(_) => Some((
                    FailureKind::Timeout,
                    format!("exceeded {}s", deadline.as_secs_f64()),
                )),
            };
            match (failure, xfail) {
                (None, None) => Outcome::Passed,
                (None, Some(reason)) => Outcome::XPassed { reason },
                (Some((_, message)), Some(reason)) => Outcome::XFailed { reason, message },
                (Some((kind, message)), None) => Outcome::Failed { kind, message },
            }
        }
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    match &outcome {
        Outcome::Failed { kind, message } => {
            tracing::warn!(case = %id, ?kind, %message, duration_ms, "Case failed")
        }
        other => tracing::debug!(case = %id, outcome = other.label(), duration_ms, "Case finished"),
    }

    CaseResult {
        id,
        check: case.check.name().to_string(),
        endpoint: case.endpoint.clone(),
        outcome,
        duration_ms,
    }
}

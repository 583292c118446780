use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::fmt::Write as _;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The service answered, but not as expected.
    Assertion,
    /// The service could not be reached or sent something unusable.
    Remote,
    /// Local configuration or a crashed case.
    Local,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed { kind: FailureKind, message: String },
    #[serde(rename = "xfailed")]
    XFailed { reason: String, message: String },
    #[serde(rename = "xpassed")]
    XPassed { reason: String },
    Skipped { reason: String },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "PASSED",
            Outcome::Failed { .. } => "FAILED",
            Outcome::XFailed { .. } => "XFAIL",
            Outcome::XPassed { .. } => "XPASS",
            Outcome::Skipped { .. } => "SKIPPED",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    fn detail(&self) -> Option<String> {
        match self {
            Outcome::Passed => None,
            Outcome::Failed { kind, message } => Some(format!("{:?}: {}", kind, message)),
            Outcome::XFailed { reason, message } => Some(format!("{} ({})", reason, message)),
            Outcome::XPassed { reason } => Some(reason.clone()),
            Outcome::Skipped { reason } => Some(reason.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub id: String,
    pub check: String,
    pub endpoint: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub xfailed: usize,
    pub xpassed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.xfailed + self.xpassed + self.skipped
    }

    /// 0 when nothing failed, 1 on any failure, 5 when no case was
    /// collected.
    pub fn exit_code(&self) -> u8 {
        if self.failed > 0 {
            1
        } else if self.total() == 0 {
            5
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub data_challenge: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    pub summary: Summary,
    pub results: Vec<CaseResult>,
}

impl Report {
    pub fn new(
        data_challenge: u8,
        header: Option<String>,
        started_at: DateTime<Utc>,
        results: Vec<CaseResult>,
    ) -> Self {
        let mut summary = Summary::default();
        for result in &results {
            match result.outcome {
                Outcome::Passed => summary.passed += 1,
                Outcome::Failed { .. } => summary.failed += 1,
                Outcome::XFailed { .. } => summary.xfailed += 1,
                Outcome::XPassed { .. } => summary.xpassed += 1,
                Outcome::Skipped { .. } => summary.skipped += 1,
            }
        }
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            data_challenge,
            header,
            summary,
            results,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.summary.exit_code()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> {
        self.results.iter().filter(|r| r.outcome.is_failure())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self, color: bool) -> String {
        let paint = |text: &str, outcome: &Outcome| -> String {
            if !color {
                return text.to_string();
            }
            match outcome {
                Outcome::Passed => text.green().to_string(),
                Outcome::Failed { .. } => text.red().bold().to_string(),
                Outcome::XFailed { .. } | Outcome::Skipped { .. } => text.yellow().to_string(),
                Outcome::XPassed { .. } => text.yellow().bold().to_string(),
            }
        };

        let mut out = String::new();
        if let Some(header) = &self.header {
            let _ = writeln!(out, "{}", header);
        }
        for result in &self.results {
            let _ = writeln!(
                out,
                "{} {} ({} ms)",
                result.id,
                paint(result.outcome.label(), &result.outcome),
                result.duration_ms
            );
        }

        let failures: Vec<&CaseResult> = self.failures().collect();
        if !failures.is_empty() {
            let _ = writeln!(out, "\nFailures:");
            for result in failures {
                if let Some(detail) = result.outcome.detail() {
                    let _ = writeln!(out, "  {}: {}", result.id, detail);
                }
            }
        }

        let s = self.summary;
        let mut counts = Vec::new();
        for (n, label) in [
            (s.failed, "failed"),
            (s.passed, "passed"),
            (s.skipped, "skipped"),
            (s.xfailed, "xfailed"),
            (s.xpassed, "xpassed"),
        ] {
            if n > 0 {
                counts.push(format!("{} {}", n, label));
            }
        }
        let line = if counts.is_empty() {
            "no tests ran".to_string()
        } else {
            counts.join(", ")
        };
        let elapsed = (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        let line = format!("{} in {:.2}s", line, elapsed);
        let _ = writeln!(
            out,
            "\n{}",
            if !color {
                line
            } else if s.failed > 0 {
                line.red().bold().to_string()
            } else {
                line.green().to_string()
            }
        );
        out
    }
}

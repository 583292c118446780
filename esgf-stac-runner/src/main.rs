use clap::{Parser, ValueEnum};
use esgf_stac::config::{ConfigOverrides, FileConfig, SuiteConfig};
use esgf_stac::{Runner, StacError};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status for usage and configuration errors.
const EXIT_USAGE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Run the ESGF STAC API conformance checks.
#[derive(Parser, Debug)]
#[command(name = "esgf-stac-tests", version)]
struct Cli {
    /// Comma separated STAC API endpoints to check
    #[arg(long, env = "ESGF_STAC_ENDPOINTS", value_delimiter = ',')]
    stac_endpoints: Option<Vec<String>>,

    /// Use the exact expectations recorded for this data challenge
    #[arg(
        long,
        env = "ESGF_STAC_DATA_CHALLENGE",
        value_parser = clap::value_parser!(u8).range(0..=4)
    )]
    data_challenge: Option<u8>,

    /// JSON config file
    #[arg(long, env = "ESGF_STAC_CONFIG")]
    config: Option<PathBuf>,

    /// Only run cases whose id contains this substring
    #[arg(short = 'k', long)]
    keyword: Option<String>,

    /// Only run cases carrying this marker, e.g. `needed_for=metagrid` or `not xfail`
    #[arg(short = 'm', long)]
    marker: Option<String>,

    /// Number of cases run at once
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Per request timeout in seconds
    #[arg(long)]
    http_timeout: Option<u64>,

    /// Per case timeout in seconds, unless the check sets its own
    #[arg(long)]
    case_timeout: Option<u64>,

    #[arg(long, value_enum, default_value = "text")]
    format: Format,

    /// List the selected cases without running them
    #[arg(long)]
    collect_only: bool,

    #[arg(long)]
    no_color: bool,
}

impl Cli {
    fn suite_config(&self) -> Result<SuiteConfig, StacError> {
        let file = self.config.as_deref().map(FileConfig::load).transpose()?;
        let overrides = ConfigOverrides {
            endpoints: self.stac_endpoints.clone(),
            data_challenge: self.data_challenge,
            http_timeout_secs: self.http_timeout,
            case_timeout_secs: self.case_timeout,
            jobs: self.jobs,
            keyword: self.keyword.clone(),
            marker: self.marker.clone(),
        };
        SuiteConfig::resolve(overrides, file)
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let runner = match cli.suite_config().and_then(Runner::new) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };
    let cases = match runner.collect() {
        Ok(cases) => cases,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    if cli.collect_only {
        for case in &cases {
            println!("{}", case.id());
        }
        println!("\n{} cases collected", cases.len());
        return ExitCode::from(if cases.is_empty() { 5 } else { 0 });
    }

    let report = runner.run(cases).await;
    match cli.format {
        Format::Text => {
            let color = !cli.no_color && std::io::stdout().is_terminal();
            print!("{}", report.render_text(color));
        }
        Format::Json => match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("error: failed to serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        },
    }
    ExitCode::from(report.exit_code())
}

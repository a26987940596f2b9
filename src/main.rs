//! CLI entrypoint for `entra-hygiene`.
//!
//! Parses command-line arguments, validates inputs, authenticates to Microsoft
//! Graph (or opens an offline snapshot), runs the selected report through the
//! library engine, prints the terminal report, and optionally writes a CSV
//! export when an output directory is provided.
use std::fs;
use std::path::PathBuf;

use anyhow::{Result, anyhow, bail};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use entra_hygiene::{
    classify::{ActivityPolicy, window_start},
    engine::{Engine, Report, ReportKind},
    export::{export_file_name, save_report_csv},
    fetch::{CredentialSource, Source},
    graph::{
        Authenticator, Credentials, DEFAULT_GRAPH_URL, GraphClient, auth::DEFAULT_LOGIN_URL,
    },
    rank::DEFAULT_TOP_N,
    report::render_report,
};
use log::{LevelFilter, error, info};

#[derive(Parser, Debug)]
#[command(
    name = "entra-hygiene",
    version,
    about = "Directory hygiene reports for Microsoft Entra ID"
)]
struct Args {
    #[command(subcommand)]
    report: ReportCommand,

    /// Read a saved Graph response (JSON) instead of querying the tenant
    #[arg(long = "snapshot", global = true)]
    snapshot: Option<PathBuf>,

    /// Reference date for day arithmetic, YYYY-MM-DD (defaults to today, UTC)
    #[arg(long = "as-of", global = true, value_parser = parse_date)]
    as_of: Option<NaiveDate>,

    /// Path to the output directory for the CSV export
    #[arg(short = 'o', long = "output", global = true)]
    output: Option<PathBuf>,

    /// Bearer token for Microsoft Graph, skipping sign-in
    #[arg(
        long = "access-token",
        env = "GRAPH_ACCESS_TOKEN",
        hide_env_values = true,
        global = true
    )]
    access_token: Option<String>,

    /// Directory (tenant) id
    #[arg(long = "tenant-id", env = "AZURE_TENANT_ID", global = true)]
    tenant_id: Option<String>,

    /// Application (client) id used to sign in
    #[arg(long = "client-id", env = "AZURE_CLIENT_ID", global = true)]
    client_id: Option<String>,

    /// Client secret for app-only sign-in; without one, sign-in is interactive
    #[arg(
        long = "client-secret",
        env = "AZURE_CLIENT_SECRET",
        hide_env_values = true,
        global = true
    )]
    client_secret: Option<String>,

    #[arg(long = "graph-url", default_value = DEFAULT_GRAPH_URL, global = true, hide = true)]
    graph_url: String,

    #[arg(long = "login-url", default_value = DEFAULT_LOGIN_URL, global = true, hide = true)]
    login_url: String,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Control color output (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto, global = true)]
    color: ColorChoice,

    /// Suppress report output (still writes the export if -o is provided)
    #[arg(short = 'q', long = "quiet", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum ReportCommand {
    /// Groups with no members
    EmptyGroups,

    /// Users with no sign-in inside their inactivity threshold
    InactiveUsers {
        /// Inactivity threshold for guest accounts, in days
        #[arg(long = "guest-days", default_value_t = 30)]
        guest_days: i64,

        /// Inactivity threshold for standard accounts, in days
        #[arg(long = "standard-days", default_value_t = 90)]
        standard_days: i64,
    },

    /// Enterprise applications with no sign-in in the lookback window
    InactiveApps {
        /// Lookback window, in days
        #[arg(long = "window-days", default_value_t = 30)]
        window_days: i64,

        /// Maximum concurrent sign-in lookups
        #[arg(long = "concurrency", default_value_t = 8)]
        concurrency: usize,

        /// Saved sign-in events to pair with --snapshot
        #[arg(long = "sign-ins")]
        sign_ins: Option<PathBuf>,
    },

    /// Applications ranked by their soonest-expiring secret or certificate
    ExpiringCredentials {
        /// Limit number of applications listed
        #[arg(long = "top", default_value_t = DEFAULT_TOP_N)]
        top: usize,

        /// Which objects to read credentials from
        #[arg(long = "source", value_enum, default_value_t = CredentialTarget::AppRegistrations)]
        source: CredentialTarget,
    },
}

impl ReportCommand {
    /// Delegated permissions requested by the interactive sign-in.
    fn scopes(&self) -> &'static [&'static str] {
        match self {
            ReportCommand::EmptyGroups => &["GroupMember.Read.All"],
            ReportCommand::InactiveUsers { .. } => &["User.Read.All", "AuditLog.Read.All"],
            ReportCommand::InactiveApps { .. } => &["Application.Read.All", "AuditLog.Read.All"],
            ReportCommand::ExpiringCredentials { .. } => &["Application.Read.All"],
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CredentialTarget {
    AppRegistrations,
    EnterpriseApps,
}

impl From<CredentialTarget> for CredentialSource {
    fn from(t: CredentialTarget) -> Self {
        match t {
            CredentialTarget::AppRegistrations => CredentialSource::AppRegistrations,
            CredentialTarget::EnterpriseApps => CredentialSource::EnterpriseApps,
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

/// Reference date for the run: `--as-of`, or today in UTC.
fn as_of(args: &Args) -> NaiveDate {
    args.as_of.unwrap_or_else(|| Utc::now().date_naive())
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn verify_inputs(args: &Args) -> Result<()> {
    if let Some(p) = &args.snapshot {
        if !p.exists() {
            bail!("snapshot file not found: {}", p.display());
        }
    }
    match &args.report {
        ReportCommand::EmptyGroups => {}
        ReportCommand::InactiveUsers {
            guest_days,
            standard_days,
        } => {
            if *guest_days < 0 || *standard_days < 0 {
                bail!("inactivity thresholds must not be negative");
            }
        }
        ReportCommand::InactiveApps {
            window_days,
            concurrency,
            sign_ins,
        } => {
            if *window_days < 0 {
                bail!("--window-days must not be negative");
            }
            if window_start(as_of(args), *window_days).is_none() {
                bail!("--window-days {window_days} reaches outside the supported date range");
            }
            if *concurrency == 0 {
                bail!("--concurrency must be at least 1");
            }
            if let Some(p) = sign_ins {
                if args.snapshot.is_none() {
                    bail!("--sign-ins is only used together with --snapshot");
                }
                if !p.exists() {
                    bail!("sign-in file not found: {}", p.display());
                }
            }
        }
        ReportCommand::ExpiringCredentials { top, .. } => {
            if *top == 0 {
                bail!("--top must be at least 1");
            }
        }
    }
    Ok(())
}

/// Open the directory source. Failures carry the exit code to use.
async fn open_source(args: &Args) -> Result<Source, (i32, anyhow::Error)> {
    if let Some(path) = &args.snapshot {
        let sign_ins = match &args.report {
            ReportCommand::InactiveApps { sign_ins, .. } => sign_ins.clone(),
            _ => None,
        };
        info!("reading offline snapshot {}", path.display());
        return Ok(Source::Snapshot {
            path: path.clone(),
            sign_ins,
        });
    }

    let credentials = Credentials::resolve(
        args.access_token.clone(),
        args.tenant_id.clone(),
        args.client_id.clone(),
        args.client_secret.clone(),
        args.report.scopes(),
    )
    .map_err(|e| (2, anyhow!(e)))?;
    let http = GraphClient::http_client().map_err(|e| (2, anyhow!(e)))?;
    let token = Authenticator::new(http.clone(), args.login_url.as_str())
        .acquire(&credentials)
        .await
        .map_err(|e| (3, anyhow!(e).context("sign-in failed")))?;
    let client =
        GraphClient::new(http, args.graph_url.as_str(), token).map_err(|e| (2, anyhow!(e)))?;
    client
        .probe()
        .await
        .map_err(|e| (3, anyhow!(e).context("Microsoft Graph capability probe failed")))?;
    info!("connected to {}", args.graph_url);

    let concurrency = match &args.report {
        ReportCommand::InactiveApps { concurrency, .. } => *concurrency,
        _ => 1,
    };
    Ok(Source::Graph {
        client,
        concurrency,
    })
}

async fn build_report(engine: &Engine, source: &Source, command: &ReportCommand) -> Result<Report> {
    let report = match command {
        ReportCommand::EmptyGroups => {
            let groups = source.groups().await?;
            engine.empty_groups(&groups)
        }
        ReportCommand::InactiveUsers {
            guest_days,
            standard_days,
        } => {
            let users = source.users().await?;
            let policy = ActivityPolicy::ByCategory {
                guest_days: *guest_days,
                standard_days: *standard_days,
            };
            engine.inactive(ReportKind::InactiveUsers, &users, policy)
        }
        ReportCommand::InactiveApps { window_days, .. } => {
            let since = window_start(engine.as_of, *window_days).ok_or_else(|| {
                anyhow!("--window-days {window_days} reaches outside the supported date range")
            })?;
            let apps = source.enterprise_app_activity(since).await?;
            let policy = ActivityPolicy::Fixed { days: *window_days };
            engine.inactive(ReportKind::InactiveApps, &apps, policy)
        }
        ReportCommand::ExpiringCredentials { top, source: target } => {
            let entries = source.credentials((*target).into()).await?;
            engine.expiring_credentials(&entries, *top)
        }
    };
    Ok(report)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(args.verbose);
    // Configure color policy
    match args.color {
        ColorChoice::Always => {
            colored::control::set_override(true);
        }
        ColorChoice::Never => {
            colored::control::set_override(false);
        }
        ColorChoice::Auto => {}
    }
    if let Err(e) = verify_inputs(&args) {
        error!("{}", e);
        std::process::exit(2);
    }

    let source = match open_source(&args).await {
        Ok(s) => s,
        Err((code, e)) => {
            error!("{:#}", e);
            std::process::exit(code);
        }
    };

    let engine = Engine::new(as_of(&args));
    let report = match build_report(&engine, &source, &args.report).await {
        Ok(r) => r,
        Err(e) => {
            error!("failed to load directory data: {:#}", e);
            std::process::exit(if source.is_offline() { 2 } else { 4 });
        }
    };
    info!(
        "{}: checked {}, flagged {}",
        report.kind, report.summary.total_checked, report.summary.total_flagged
    );

    if !args.quiet {
        println!("{}", render_report(&report));
    }

    if let Some(outdir) = args.output {
        if let Err(e) = fs::create_dir_all(&outdir) {
            error!(
                "failed to create output directory {}: {}",
                outdir.display(),
                e
            );
            std::process::exit(5);
        }
        let path = outdir.join(export_file_name(report.kind, &chrono::Local::now()));
        if let Err(e) = save_report_csv(&report, &path) {
            error!("failed to write {}: {}", path.display(), e);
            std::process::exit(5);
        }
        info!("wrote {}", path.display());
    }
}

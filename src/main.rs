//! AutoGuard command-line client.

use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use autoguard::api::{ClaimFilters, ClaimStatus, ReportFormat, ReportRequest};
use autoguard::dashboard::{DashboardController, DashboardState, Notice};
use autoguard::materializer::{ClaimLedger, ClaimMaterializer};
use autoguard::session::{session_path, SessionContext};
use autoguard::views::render;
use autoguard::{credentials, upload, ApiClient, AppConfig, ClaimsBackend};

const LEDGER_FILE_NAME: &str = "claims.db";

#[derive(Parser, Debug)]
#[command(name = "autoguard")]
#[command(version, about = "AutoGuard vehicle damage claims from the terminal")]
struct Cli {
    /// Config file (defaults to <config dir>/autoguard/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the backend base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Remote(RemoteCommand),
    /// Log in and store the access token in the OS keyring
    Login {
        #[arg(long)]
        username: String,
        /// Read from stdin when omitted
        #[arg(long, env = "AUTOGUARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored access token
    Logout,
}

/// Commands that talk to the backend with the stored token.
#[derive(Subcommand, Debug)]
enum RemoteCommand {
    /// Upload a vehicle photo and start a damage analysis
    Upload {
        file: PathBuf,
        /// Open the dashboard for the new analysis once uploaded
        #[arg(long)]
        open: bool,
    },
    /// Show the damage dashboard for an analysis
    Dashboard {
        /// Analysis id (defaults to the last one opened or uploaded)
        #[arg(long)]
        id: Option<String>,
        /// Render the first result instead of waiting for the analysis to finish
        #[arg(long)]
        no_wait: bool,
        /// Highlight a damage by id
        #[arg(long)]
        select: Option<String>,
        /// Approve the claim once ready
        #[arg(long, conflicts_with_all = ["reject", "review"])]
        approve: bool,
        /// Reject the claim once ready, with this reason
        #[arg(long, conflicts_with = "review")]
        reject: Option<String>,
        /// Send the claim for review, with these notes
        #[arg(long)]
        review: Option<String>,
        /// Adjuster notes for --approve
        #[arg(long)]
        notes: Option<String>,
    },
    /// Show the processing status of an analysis
    Status { id: String },
    /// Browse and decide claims
    Claims {
        #[command(subcommand)]
        command: ClaimsCommand,
    },
    /// Generate a claim report
    Report {
        claim_id: String,
        #[arg(long, value_enum, default_value = "pdf")]
        format: FormatArg,
        /// Output file (defaults to claim-<id>.<ext>)
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        no_images: bool,
        /// Print the download link of an already generated report instead
        #[arg(long, conflicts_with_all = ["out", "no_images"])]
        url: bool,
    },
    /// Dashboard counters
    Stats,
    /// Daily claim counts
    Trends {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}

#[derive(Subcommand, Debug)]
enum ClaimsCommand {
    List {
        #[arg(long)]
        status: Option<ClaimStatus>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        min_confidence: Option<f64>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    Show {
        id: String,
    },
    Approve {
        id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    Reject {
        id: String,
        #[arg(long)]
        reason: String,
    },
    Review {
        id: String,
        #[arg(long)]
        notes: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Pdf,
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Pdf => ReportFormat::Pdf,
            FormatArg::Json => ReportFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    autoguard::init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(url) = cli.api_url.clone() {
        config.api_base_url = url;
        config.validate()?;
    }
    let ansi = !cli.no_color && std::io::stdout().is_terminal();

    match cli.command {
        Command::Login { username, password } => login(&config, &username, password).await,
        Command::Logout => {
            credentials::delete_token()?;
            println!("Logged out");
            Ok(())
        }
        Command::Remote(command) => {
            let client = build_client(&config)?;
            run(command, &config, client, ansi).await
        }
    }
}

fn build_client(config: &AppConfig) -> Result<ApiClient> {
    let token = credentials::load_token().unwrap_or_else(|e| {
        warn!("Continuing without access token: {}", e);
        None
    });
    let client = ApiClient::new(&config.api_base_url, config.request_timeout())?.with_token(token);
    Ok(client)
}

async fn run(command: RemoteCommand, config: &AppConfig, client: ApiClient, ansi: bool) -> Result<()> {
    let data_dir = config.data_dir();
    let session_file = session_path(&data_dir);

    match command {
        RemoteCommand::Upload { file, open } => {
            let mut session = SessionContext::load(&session_file);
            let response = upload::upload_file(&client, &file, &mut session).await?;
            session.save(&session_file)?;
            println!(
                "Analysis {} {:?} (about {}s)",
                response.analysis_id, response.status, response.estimated_time
            );
            if open {
                let options = DashboardOptions::default();
                dashboard(config, client, Some(response.analysis_id), options, ansi).await?;
            }
            Ok(())
        }
        RemoteCommand::Dashboard {
            id,
            no_wait,
            select,
            approve,
            reject,
            review,
            notes,
        } => {
            let options = DashboardOptions {
                no_wait,
                select,
                approve,
                reject,
                review,
                notes,
            };
            dashboard(config, client, id, options, ansi).await
        }
        RemoteCommand::Status { id } => {
            let progress = client.get_analysis_status(&id).await?;
            println!("{}: {} ({}%)", id, progress.status.as_str(), progress.progress);
            Ok(())
        }
        RemoteCommand::Claims { command } => claims(&client, command).await,
        RemoteCommand::Report {
            claim_id,
            format,
            out,
            no_images,
            url,
        } => {
            if url {
                println!("{}", client.report_download_url(&claim_id).await?);
                return Ok(());
            }
            let format = ReportFormat::from(format);
            let request = ReportRequest {
                claim_id: claim_id.clone(),
                include_images: !no_images,
                include_confidence_metrics: true,
                format,
            };
            let bytes = client.generate_report(&request).await?;
            let out = out.unwrap_or_else(|| {
                PathBuf::from(format!("claim-{}.{}", claim_id, format.extension()))
            });
            write_file(&out, &bytes)?;
            println!("Wrote {} ({} bytes)", out.display(), bytes.len());
            Ok(())
        }
        RemoteCommand::Stats => {
            let stats = client.dashboard_stats().await?;
            print!("{}", render::render_stats(&stats));
            Ok(())
        }
        RemoteCommand::Trends { days } => {
            let points = client.claims_trend(days).await?;
            print!("{}", render::render_trends(&points));
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
struct DashboardOptions {
    no_wait: bool,
    select: Option<String>,
    approve: bool,
    reject: Option<String>,
    review: Option<String>,
    notes: Option<String>,
}

async fn dashboard(
    config: &AppConfig,
    client: ApiClient,
    id: Option<String>,
    options: DashboardOptions,
    ansi: bool,
) -> Result<()> {
    let data_dir = config.data_dir();
    let session_file = session_path(&data_dir);
    let session = SessionContext::load(&session_file);

    let ledger_path = data_dir.join(LEDGER_FILE_NAME);
    let ledger = tokio::task::spawn_blocking(move || ClaimLedger::new(&ledger_path))
        .await
        .context("Claim ledger task failed")?;

    let backend: Arc<dyn ClaimsBackend> = Arc::new(client);
    let mut materializer = ClaimMaterializer::new(backend.clone());
    match ledger {
        Ok(ledger) => materializer = materializer.with_ledger(ledger),
        Err(e) => warn!("Claim ledger unavailable, duplicate protection is per run only: {}", e),
    }

    let mut page = DashboardController::new(backend, config.poll_policy(), materializer, session)
        .with_session_path(session_file);
    page.open(id.as_deref());

    let mut last_rendered = None;
    while !page.state().is_settled() {
        if !page.next_update().await {
            break;
        }
        if let Some(ref damage_id) = options.select {
            page.select(damage_id);
        }
        if !matches!(page.state(), DashboardState::Loading) && last_rendered.as_ref() != Some(page.state()) {
            print!("{}", page.render(ansi));
            last_rendered = Some(page.state().clone());
        }
        if options.no_wait && page.state().view().is_some() {
            break;
        }
    }
    if last_rendered.as_ref() != Some(page.state()) {
        print!("{}", page.render(ansi));
    }

    for notice in page.take_notices() {
        print_notice(&notice);
    }

    if let DashboardState::Ready(_) = page.state() {
        let notice = if options.approve {
            Some(page.approve(options.notes.as_deref()).await)
        } else if let Some(ref reason) = options.reject {
            Some(page.reject(reason).await)
        } else if let Some(ref notes) = options.review {
            Some(page.request_review(notes).await)
        } else {
            None
        };
        if let Some(notice) = notice {
            print_notice(&notice);
        }
    }

    page.teardown();
    if let DashboardState::Error(ref message) = page.state() {
        bail!("{}", message);
    }
    Ok(())
}

async fn claims(client: &ApiClient, command: ClaimsCommand) -> Result<()> {
    match command {
        ClaimsCommand::List {
            status,
            search,
            min_confidence,
            page,
            limit,
        } => {
            let filters = ClaimFilters {
                status,
                search_query: search,
                min_confidence,
                page: Some(page),
                limit: Some(limit),
                ..Default::default()
            };
            let claims = client.list_claims(&filters).await?;
            print!("{}", render::render_claims_page(&claims));
        }
        ClaimsCommand::Show { id } => {
            let claim = client.get_claim(&id).await?;
            print!("{}", render::render_claim(&claim));
        }
        ClaimsCommand::Approve { id, notes } => {
            let claim = client.approve_claim(&id, notes.as_deref()).await?;
            print!("{}", render::render_claim(&claim));
        }
        ClaimsCommand::Reject { id, reason } => {
            let claim = client.reject_claim(&id, &reason).await?;
            print!("{}", render::render_claim(&claim));
        }
        ClaimsCommand::Review { id, notes } => {
            let claim = client.request_review(&id, &notes).await?;
            print!("{}", render::render_claim(&claim));
        }
    }
    Ok(())
}

async fn login(config: &AppConfig, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => {
            eprint!("Password: ");
            std::io::stderr().flush()?;
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        bail!("Password must not be empty");
    }

    let client = ApiClient::new(&config.api_base_url, config.request_timeout())?;
    let token = client.login(username, &password).await?;
    credentials::store_token(&token.access_token)?;
    info!("Logged in as {}", username);
    println!("Logged in as {}", username);
    Ok(())
}

fn print_notice(notice: &Notice) {
    if notice.is_error() {
        eprintln!("! {}", notice.message);
    } else {
        println!("{}", notice.message);
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {:?}", path))
}

//! Keyframe stream reconciler
//!
//! Brings the relay store, the ingest store, chat rooms and XMPP accounts in
//! line with the stream manifest. Meant to be run by a timer or after every
//! manifest change; re-running on an unchanged manifest is a no-op.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use keyframe_core::{IngestdConfig, Manifest, SiteConfig};
use keyframe_crypto::KeyedBlake3;
use keyframe_streams::recovery;
use keyframe_streams::run_lock::RunLock;
use keyframe_streams::storage::{IngestStore, RelayStore};
use keyframe_streams::tools::{Prosodyctl, Sendmail, StreamMucManager, Systemctl, Toolbox};
use keyframe_streams::{Reconciler, RunMode};

#[derive(Debug, Parser)]
#[command(name = "keyframe-streams")]
#[command(version, about = "Keyframe stream reconciler - provisions streams from a manifest")]
struct Cli {
    /// Site domain streams are served under
    #[arg(long, global = true, env = "KEYFRAME_DOMAIN")]
    domain: Option<String>,

    /// Relay (frontend) stream store
    #[arg(long, global = true, default_value = "/var/lib/keyframe/streams.db")]
    relay_db: PathBuf,

    /// Ingest service stream store
    #[arg(long, global = true, default_value = "/var/lib/ingestd/streams.db")]
    ingest_db: PathBuf,

    /// Ingest service config holding the base64 passphrase key under `secret`
    #[arg(
        long,
        global = true,
        default_value = "/var/lib/ingestd/ingestd-srt.toml"
    )]
    ingestd_config: PathBuf,

    /// SRT port the ingest service listens on
    #[arg(long, global = true, default_value_t = keyframe_core::config::DEFAULT_SRT_PORT)]
    srt_port: u16,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Provision new streams, decommission removed ones, sync rooms
    Reconcile(ReconcileArgs),
    /// Print the SRT URL of an existing stream
    Passphrase {
        /// Stream name as used in the manifest
        name: String,
    },
    /// Report inconsistencies between the relay and ingest stores
    Audit,
}

#[derive(Debug, Args)]
struct ReconcileArgs {
    /// JSON stream manifest
    #[arg(long, env = "STREAMS_PATH")]
    manifest: PathBuf,

    /// Stage and log every change, then roll back without touching anything else
    #[arg(long)]
    dry_run: bool,

    /// Password file of the room manager's XMPP account
    #[arg(
        long,
        default_value = "/var/lib/keyframe/stream-muc-manager/xmpp-password"
    )]
    muc_password_file: PathBuf,

    /// systemd unit of the SRT ingest service
    #[arg(long, default_value = "ingestd-srt")]
    ingest_service: String,

    /// Lock file serializing runs
    #[arg(long, default_value = "/run/keyframe-streams.lock")]
    lock_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    keyframe_core::tracing_init::init_tracing("keyframe_streams=info", cli.log_json);

    match &cli.command {
        Commands::Reconcile(args) => reconcile(&cli, &site_config(&cli)?, args).await,
        Commands::Passphrase { name } => passphrase(&cli, &site_config(&cli)?, name).await,
        Commands::Audit => audit(&cli).await,
    }
}

fn site_config(cli: &Cli) -> Result<SiteConfig> {
    let Some(domain) = cli.domain.clone() else {
        bail!("--domain (or KEYFRAME_DOMAIN) is required");
    };
    let site = SiteConfig::new(domain).with_srt_port(cli.srt_port);
    site.validate()?;
    Ok(site)
}

fn load_deriver(path: &Path) -> Result<KeyedBlake3> {
    let config = IngestdConfig::load(path)
        .with_context(|| format!("failed to load passphrase key from {}", path.display()))?;
    Ok(KeyedBlake3::new(config.secret))
}

async fn open_stores(cli: &Cli) -> Result<(RelayStore, IngestStore)> {
    let relay = RelayStore::open(&cli.relay_db)
        .await
        .with_context(|| format!("failed to open relay store {}", cli.relay_db.display()))?;
    let ingest = IngestStore::open(&cli.ingest_db)
        .await
        .with_context(|| format!("failed to open ingest store {}", cli.ingest_db.display()))?;
    Ok((relay, ingest))
}

async fn reconcile(cli: &Cli, site: &SiteConfig, args: &ReconcileArgs) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)
        .with_context(|| format!("failed to load manifest {}", args.manifest.display()))?;
    let deriver = load_deriver(&cli.ingestd_config)?;

    let lock = RunLock::acquire(&args.lock_file)?;
    info!(lock = %lock.path().display(), "Acquired run lock");

    let (relay, ingest) = open_stores(cli).await?;
    let tools = Toolbox {
        registrar: Arc::new(Prosodyctl::default()),
        dispatcher: Arc::new(Sendmail::default()),
        membership: Arc::new(StreamMucManager::new(
            "stream-muc-manager",
            site.membership_identity(),
            args.muc_password_file.clone(),
        )),
        reloader: Arc::new(Systemctl::new(args.ingest_service.as_str())),
    };
    let mode = if args.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Apply
    };

    let report = Reconciler::new(site, &deriver, &tools)
        .run(&manifest, &relay, &ingest, mode)
        .await?;

    info!(
        dry_run = report.dry_run,
        desired = report.desired,
        provisioned = report.provisioned.len(),
        already_provisioned = report.already_provisioned,
        decommissioned = report.decommissioned.len(),
        registration_failures = report.registration_failures.len(),
        mail_failures = report.mail_failures.len(),
        reload = %report.reload.map_or_else(|| "skipped".to_string(), |r| r.to_string()),
        "Reconciliation complete"
    );
    Ok(())
}

async fn passphrase(cli: &Cli, site: &SiteConfig, name: &str) -> Result<()> {
    let deriver = load_deriver(&cli.ingestd_config)?;
    let (relay, ingest) = open_stores(cli).await?;
    let creds = recovery::recover_srt_credentials(site, &deriver, &relay, &ingest, name)
        .await
        .with_context(|| format!("no provisioned stream named {name:?}"))?;

    let mut stdout = std::io::stdout().lock();
    writeln!(
        stdout,
        "{}",
        creds.connection_url(&site.ingest_host(), site.srt_port)
    )?;
    Ok(())
}

async fn audit(cli: &Cli) -> Result<()> {
    let (relay, ingest) = open_stores(cli).await?;
    let report = recovery::audit(&relay, &ingest).await?;
    info!(
        missing_token = report.missing_token.len(),
        missing_ingest = report.missing_ingest.len(),
        orphaned_ingest = report.orphaned_ingest.len(),
        "Audit complete"
    );
    Ok(())
}

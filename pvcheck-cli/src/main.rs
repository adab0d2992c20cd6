//! pvcheck: readiness and pre-flight checks for OpenShift on IBM Power Virtual Server.
//!
//! - `check-create` reports whether every cloud resource of an installed
//!   cluster exists and is healthy
//! - `check-ci` verifies a CI workspace holds no leftovers, optionally deleting them
//! - `watch-create` follows an installation through its CAPI and OpenShift phases
//! - `check-kubeconfig` dumps cluster diagnostics through `oc`
//! - `check-capi-kubeconfig` dumps Cluster API conditions and installer log highlights

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pvcheck_cloud::Endpoints;
use pvcheck_core::sink::StatusSink;
use pvcheck_core::{
    capi_phases, openshift_phases, CheckConfig, Checker, CloudContext, ConsoleSink,
    DiscoveryStrategy, LoadBalancerProbe, Metadata, PhaseLimits, PhaseOutcome, PhaseWatcher,
    Report, WatchReport,
};

mod oc;

use oc::OcStatusSource;

const DEFAULT_FILTER: &str = "pvcheck=info,pvcheck_core=info,pvcheck_cloud=info";
const DEBUG_FILTER: &str = "pvcheck=debug,pvcheck_core=debug,pvcheck_cloud=debug";

/// PowerVS cluster checker
#[derive(Parser, Debug)]
#[command(name = "pvcheck", version, about)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// IBM Cloud API key
    #[arg(long, env = "IBMCLOUD_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Resource discovery strategy
    #[arg(long, value_enum, default_value_t = Strategy::NameMatch, global = true)]
    strategy: Strategy,

    /// Deadline for a single cloud or oc call, in seconds
    #[arg(long, default_value = "300", global = true)]
    timeout_secs: u64,

    /// Sleep between two polls of a watch phase, in seconds
    #[arg(long, default_value = "10", global = true)]
    retry_secs: u64,

    /// Give up on a watch phase after this many polls
    #[arg(long, global = true)]
    phase_max_attempts: Option<u32>,

    /// Give up on a watch phase after this many seconds
    #[arg(long, global = true)]
    phase_deadline_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Strategy {
    /// Walk provider listings and compare names
    #[value(alias = "name")]
    NameMatch,
    /// Query the global search service by cluster tag
    #[value(alias = "tag")]
    TagSearch,
}

impl From<Strategy> for DiscoveryStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::NameMatch => DiscoveryStrategy::NameMatch,
            Strategy::TagSearch => DiscoveryStrategy::TagSearch,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that every resource of an installed cluster is ready
    CheckCreate {
        /// Installer metadata.json
        #[arg(long)]
        metadata: PathBuf,
    },

    /// Check that a CI workspace holds no leftover objects
    CheckCi {
        /// CI metadata file
        #[arg(long)]
        metadata: PathBuf,

        /// Delete leftovers as they are found
        #[arg(long)]
        clean: bool,
    },

    /// Follow an installation until the cluster is up
    WatchCreate {
        /// Installer metadata.json [default: <install-dir>/metadata.json]
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Installer working directory
        #[arg(long)]
        install_dir: PathBuf,
    },

    /// Print cluster diagnostics
    CheckKubeconfig {
        /// Admin kubeconfig of the cluster
        #[arg(long)]
        kubeconfig: PathBuf,
    },

    /// Print Cluster API conditions during an installation
    CheckCapiKubeconfig {
        /// Kubeconfig of the installer's local control plane
        #[arg(long)]
        kubeconfig: PathBuf,
    },
}

impl Cli {
    fn config(&self) -> CheckConfig {
        CheckConfig {
            call_timeout: Duration::from_secs(self.timeout_secs),
            retry_interval: Duration::from_secs(self.retry_secs),
            strategy: self.strategy.into(),
            phase_limits: PhaseLimits {
                max_attempts: self.phase_max_attempts,
                deadline: self.phase_deadline_secs.map(Duration::from_secs),
            },
            ..CheckConfig::default()
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .context("no API key: pass --api-key or set IBMCLOUD_API_KEY")
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    let fallback = if debug { DEBUG_FILTER } else { DEFAULT_FILTER };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Returns false when the run finished but a watch phase did not succeed.
async fn run(cli: Cli) -> Result<bool> {
    let sink: Arc<dyn StatusSink> = Arc::new(ConsoleSink);
    let config = cli.config();

    match &cli.command {
        Commands::CheckCreate { metadata } => {
            let metadata = Metadata::load_create(metadata)
                .with_context(|| format!("reading {}", metadata.display()))?;
            let ctx = connect(cli.api_key()?, metadata, config).await?;
            let reports = Checker::new(ctx, sink).run_create().await?;
            summarize(&reports);
            Ok(true)
        }
        Commands::CheckCi { metadata, clean } => {
            let metadata = Metadata::load_ci(metadata)
                .with_context(|| format!("reading {}", metadata.display()))?;
            let ctx = connect(cli.api_key()?, metadata, config).await?;
            let reports = Checker::new(ctx, sink).run_ci(*clean).await?;
            summarize(&reports);
            Ok(true)
        }
        Commands::WatchCreate {
            metadata,
            install_dir,
        } => {
            let path = watch_metadata_path(metadata.as_deref(), install_dir);
            let metadata = Metadata::load_create(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let ctx = connect(cli.api_key()?, metadata, config.clone()).await?;
            watch_create(ctx, sink, &config, install_dir).await
        }
        Commands::CheckKubeconfig { kubeconfig } => {
            check_kubeconfig(kubeconfig, config.call_timeout).await;
            Ok(true)
        }
        Commands::CheckCapiKubeconfig { kubeconfig } => {
            let oc = OcStatusSource::default();
            let mut stdout = std::io::stdout().lock();
            check_capi_kubeconfig(&oc, kubeconfig, config.call_timeout, &mut stdout)
                .await
                .context("writing diagnostics")?;
            Ok(true)
        }
    }
}

/// The installer leaves `metadata.json` in its working directory.
fn watch_metadata_path(metadata: Option<&Path>, install_dir: &Path) -> PathBuf {
    metadata.map_or_else(|| install_dir.join("metadata.json"), Path::to_path_buf)
}

async fn connect(api_key: &str, metadata: Metadata, config: CheckConfig) -> Result<Arc<CloudContext>> {
    let endpoints = Endpoints::for_regions(&metadata.region, &metadata.vpc_region);
    let ctx = pvcheck_cloud::connect(api_key, metadata, config, &endpoints)
        .await
        .context("connecting to IBM Cloud")?;
    Ok(Arc::new(ctx))
}

fn summarize(reports: &[Report]) {
    let failed: Vec<_> = reports.iter().filter(|r| !r.is_ok()).collect();
    if failed.is_empty() {
        info!(resources = reports.len(), "all resources OK");
        return;
    }
    for report in failed {
        warn!(
            kind = %report.kind,
            name = %report.name,
            failures = report.failures.len(),
            "resource NOTOK"
        );
    }
}

async fn watch_create(
    ctx: Arc<CloudContext>,
    sink: Arc<dyn StatusSink>,
    config: &CheckConfig,
    install_dir: &Path,
) -> Result<bool> {
    let tune = |phases: Vec<pvcheck_core::Phase>| -> Vec<pvcheck_core::Phase> {
        phases
            .into_iter()
            .map(|p| {
                p.with_retry_interval(config.retry_interval)
                    .with_limits(config.phase_limits)
            })
            .collect()
    };

    let source = Arc::new(OcStatusSource::default());
    let watcher = PhaseWatcher::new(source, sink.clone(), config.call_timeout);

    info!(install_dir = %install_dir.display(), "watching cluster-api phases");
    let capi = watcher.run(tune(capi_phases(install_dir))).await;
    log_outcomes(&capi);
    if !capi.is_success() {
        return Ok(false);
    }

    let checker = Checker::new(ctx, sink);
    let probe = LoadBalancerProbe::internal(checker.registry())
        .await
        .context("locating the internal load balancer")?;
    let watcher = watcher.with_probe(Arc::new(probe));

    info!("watching OpenShift phases");
    let openshift = watcher.run(tune(openshift_phases(install_dir))).await;
    log_outcomes(&openshift);
    Ok(openshift.is_success())
}

fn log_outcomes(report: &WatchReport) {
    for (name, outcome) in &report.outcomes {
        match outcome {
            PhaseOutcome::Succeeded { attempts } => info!(phase = %name, attempts, "phase complete"),
            PhaseOutcome::Expired { attempts } => warn!(phase = %name, attempts, "phase gave up"),
            PhaseOutcome::Failed(e) => error!(phase = %name, "phase failed: {}", e),
        }
    }
}

async fn check_kubeconfig(kubeconfig: &Path, timeout: Duration) {
    let oc = OcStatusSource::default();
    for line in oc::DIAGNOSTICS {
        println!("{}", oc::SEPARATOR);
        println!("oc {}", line);
        let args = oc::diagnostic_args(line);
        match tokio::time::timeout(timeout, oc.run(kubeconfig, &args[..])).await {
            Ok(Ok(out)) => print!("{}", out),
            Ok(Err(e)) => println!("Error: could not run command: {}", e),
            Err(_) => println!("Error: could not run command: timed out after {:?}", timeout),
        }
    }
}

async fn check_capi_kubeconfig(
    oc: &OcStatusSource,
    kubeconfig: &Path,
    timeout: Duration,
    out: &mut impl Write,
) -> std::io::Result<()> {
    for resource in oc::CAPI_RESOURCES {
        let args = oc::capi_args(resource);
        writeln!(out, "{}", oc::SEPARATOR)?;
        writeln!(out, "oc {} | conditions", args.join(" "))?;

        let stdout = match tokio::time::timeout(timeout, oc.run(kubeconfig, &args[..])).await {
            Ok(Ok(stdout)) => stdout,
            Ok(Err(e)) => {
                writeln!(out, "Error: could not run command: {}", e)?;
                continue;
            }
            Err(_) => {
                writeln!(out, "Error: could not run command: timed out after {:?}", timeout)?;
                continue;
            }
        };
        let doc: serde_json::Value = match serde_json::from_str(&stdout) {
            Ok(doc) => doc,
            Err(e) => {
                writeln!(out, "Error: could not parse output: {}", e)?;
                continue;
            }
        };
        for condition in oc::item_conditions(&doc) {
            let pretty = serde_json::to_string_pretty(condition).unwrap_or_default();
            writeln!(out, "{}", pretty)?;
        }
    }

    let Some(log) = oc::install_log_for(kubeconfig) else {
        return Ok(());
    };
    writeln!(out, "{}", oc::SEPARATOR)?;
    writeln!(out, "highlights of {}", log.display())?;
    match tokio::fs::read_to_string(&log).await {
        Ok(content) => {
            for line in oc::install_log_highlights(&content) {
                writeln!(out, "{}", line)?;
            }
        }
        Err(e) => writeln!(out, "Error: could not read {}: {}", log.display(), e)?,
    }
    Ok(())
}

//! hostpulse - host metric sampling service binary.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use hostpulse::metrics::network::network_interfaces;
use hostpulse::{
    collect, start_web_server, AppState, FormattedSnapshot, PeriodicProvider, SamplingConfig,
    SessionConfig, SessionKind, SessionRegistry, SnapshotFormatter, SnapshotStats,
    SystemCollector, WebConfig, DEFAULT_WEB_PORT,
};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "hostpulse")]
#[command(about = "Bounded host metric sampling over HTTP")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Samples CPU, memory, disk, process and network metrics of the local \
host and serves them as JSON. Concurrent requests for the same kind of data share one \
sampling session.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Web server port
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_WEB_PORT)]
    port: u16,

    #[command(flatten)]
    sampling: SamplingArgs,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Per-session sampling overrides.
#[derive(Args, Debug, Clone)]
struct SamplingArgs {
    /// Snapshots collected by the system session
    #[arg(long, default_value_t = 5)]
    system_count: usize,

    /// Milliseconds between system snapshots
    #[arg(long, default_value_t = 2_000)]
    system_interval_ms: u64,

    /// Deadline of the system session in milliseconds
    #[arg(long, default_value_t = 10_000)]
    system_timeout_ms: u64,

    /// Traffic samples collected by the network session
    #[arg(long, default_value_t = 10)]
    network_count: usize,

    /// Milliseconds between traffic samples
    #[arg(long, default_value_t = 1_000)]
    network_interval_ms: u64,

    /// Deadline of the network session in milliseconds
    #[arg(long, default_value_t = 12_000)]
    network_timeout_ms: u64,

    /// Snapshots kept by the rolling history session
    #[arg(long, default_value_t = 30)]
    history_size: usize,

    /// Milliseconds between history snapshots
    #[arg(long, default_value_t = 2_000)]
    history_interval_ms: u64,

    /// Lifetime of the history session in milliseconds
    #[arg(long, default_value_t = 60_000)]
    history_timeout_ms: u64,

    /// Processes kept in each formatted snapshot
    #[arg(long, default_value_t = 3)]
    max_processes: usize,
}

impl SamplingArgs {
    fn to_config(&self) -> SamplingConfig {
        let mut config = SamplingConfig::default();
        config.system.session = SessionConfig::new(
            self.system_count,
            Duration::from_millis(self.system_timeout_ms),
        );
        config.system.interval = Duration::from_millis(self.system_interval_ms);
        config.network.session = SessionConfig::new(
            self.network_count,
            Duration::from_millis(self.network_timeout_ms),
        );
        config.network.interval = Duration::from_millis(self.network_interval_ms);
        config.history.session = SessionConfig::sliding(
            self.history_size,
            Duration::from_millis(self.history_timeout_ms),
        );
        config.history.interval = Duration::from_millis(self.history_interval_ms);
        config.max_processes = self.max_processes;
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server (default)
    Serve(ServeArgs),

    /// Run one system sampling session and print the batch
    Snapshot(SnapshotArgs),

    /// Show host information
    Info,
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    match &cli.command {
        Some(Commands::Serve(args)) => serve_command(&cli, args).await?,
        Some(Commands::Snapshot(args)) => snapshot_command(&cli, args).await?,
        Some(Commands::Info) => info_command()?,
        None => serve_command(&cli, &ServeArgs::default()).await?,
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        LevelFilter::DEBUG
    } else if cli.verbose {
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    Ok(())
}

async fn serve_command(cli: &Cli, args: &ServeArgs) -> anyhow::Result<()> {
    let sampling = cli.sampling.to_config();
    let state = Arc::new(AppState::new(sampling).context("failed to initialize service state")?);
    let web_config = WebConfig::new(&cli.host, cli.port).with_cors(!args.no_cors);

    info!("Web server configuration:");
    info!("  - Bind address: {}", web_config.bind_address());
    info!("  - CORS enabled: {}", web_config.enable_cors);
    info!(
        "  - System session: {} snapshots every {:?}, timeout {:?}",
        sampling.system.session.target_count,
        sampling.system.interval,
        sampling.system.session.timeout
    );
    info!(
        "  - Network session: {} samples every {:?}, timeout {:?}",
        sampling.network.session.target_count,
        sampling.network.interval,
        sampling.network.session.timeout
    );

    start_web_server(web_config, state).await?;
    Ok(())
}

async fn snapshot_command(cli: &Cli, args: &SnapshotArgs) -> anyhow::Result<()> {
    let sampling = cli.sampling.to_config();
    sampling.validate()?;
    let sampler = sampling.system;
    let formatter = SnapshotFormatter {
        max_processes: sampling.max_processes,
    };
    let registry = SessionRegistry::new();

    let snapshots = collect(
        &registry,
        SessionKind::SYSTEM,
        sampler.session,
        move || Ok(PeriodicProvider::new(SystemCollector::new()?, sampler.interval)),
        formatter,
    )
    .await
    .context("system sampling session failed")?;
    let stats = SnapshotStats::compute(&snapshots);

    match args.format.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&serde_json::json!({
                "snapshots": &*snapshots,
                "stats": stats,
            }))?;
            println!("{}", json);
        }
        "pretty" => print_pretty_batch(&snapshots, stats.as_ref()),
        other => anyhow::bail!("Unsupported format: {}. Use 'json' or 'pretty'", other),
    }

    Ok(())
}

fn info_command() -> anyhow::Result<()> {
    println!("hostpulse host information");
    println!("==========================");
    println!();

    let mut collector = SystemCollector::new()?;

    println!("System Details:");
    println!(
        "  Hostname: {}",
        System::host_name().unwrap_or_else(|| "unknown".to_string())
    );
    println!(
        "  OS: {} {}",
        System::name().unwrap_or_default(),
        System::os_version().unwrap_or_default()
    );
    println!(
        "  Kernel: {}",
        System::kernel_version().unwrap_or_default()
    );
    println!("  Uptime: {} seconds", System::uptime());
    println!();

    let cpu = collector.cpu_details();
    let memory = collector.memory();
    println!("Hardware:");
    println!("  CPU: {} ({} cores)", cpu.model, cpu.total_cores);
    println!("  Architecture: {}", System::cpu_arch().unwrap_or_default());
    println!("  Memory: {} total", hostpulse::metrics::format_bytes(memory.total));
    if let Some(temperature) = collector.cpu_temperature() {
        println!("  CPU Temperature: {:.1}°C", temperature.main);
    }
    println!();

    println!("Storage:");
    for disk in collector.disks() {
        println!(
            "  {}: {} total, {:.1}% used",
            disk.mount_point,
            hostpulse::metrics::format_bytes(disk.size),
            disk.percent_used
        );
    }
    println!();

    println!("Network Interfaces:");
    for iface in network_interfaces() {
        println!(
            "  {}: {}",
            iface.name,
            if iface.is_up { "UP" } else { "DOWN" }
        );
    }

    Ok(())
}

fn print_pretty_batch(snapshots: &[FormattedSnapshot], stats: Option<&SnapshotStats>) {
    println!("System sampling batch ({} snapshots)", snapshots.len());
    println!("==========================================");

    for snapshot in snapshots {
        println!();
        println!("{}", snapshot.time);
        if let Some(cpu) = &snapshot.cpu {
            print!("  CPU: {:.1}%", cpu.usage_percent);
            if let Some(load) = &cpu.load_average {
                print!(
                    "  (load {:.2}, {:.2}, {:.2})",
                    load.one_minute, load.five_minutes, load.fifteen_minutes
                );
            }
            println!();
        }
        if let Some(memory) = &snapshot.memory {
            println!(
                "  Memory: {} / {} ({:.1}%)",
                memory.used, memory.total, memory.percent_used
            );
        }
        for process in &snapshot.processes {
            println!(
                "  {:>7} {:<24} {:>5.1}% {}",
                process.pid, process.name, process.cpu_percent, process.memory
            );
        }
    }

    if let Some(stats) = stats {
        println!();
        println!("Statistics:");
        println!(
            "  CPU: min {:.1}%, max {:.1}%, avg {:.1}%",
            stats.cpu.min, stats.cpu.max, stats.cpu.avg
        );
        println!(
            "  Memory used: min {:.1}%, max {:.1}%, avg {:.1}%",
            stats.memory.percent_used.min,
            stats.memory.percent_used.max,
            stats.memory.percent_used.avg
        );
    }
}

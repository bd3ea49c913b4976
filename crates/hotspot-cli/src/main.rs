mod events;
mod presenter;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use hotspot_controller::{
    FailureReason, Group, GroupService, HotspotChannels, HotspotConfig, HotspotController,
    HotspotEvent, SimulatedBehavior, SimulatedGroupService, Status, WpaCliGroupService,
};

use presenter::LogPresenter;

#[derive(Parser)]
#[command(name = "hotspotctl", about = "Bring a WiFi P2P hotspot group up and down")]
struct Cli {
    /// First backoff delay in ms while waiting for group ownership.
    #[arg(long, global = true)]
    backoff_base_ms: Option<u64>,

    /// Re-query budget after group creation.
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Print events as JSON lines on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExistingGroup {
    Owner,
    Client,
}

#[derive(Subcommand)]
enum Command {
    /// Create a group through wpa_supplicant and keep it up until Ctrl-C.
    Up {
        /// P2P control interface.
        #[arg(long, default_value = "wlan0")]
        iface: String,
        /// wpa_supplicant control socket directory.
        #[arg(long)]
        ctrl_dir: Option<String>,
    },

    /// Run the lifecycle against an in-memory group service.
    Sim {
        /// Group present before start.
        #[arg(long, value_enum)]
        existing: Option<ExistingGroup>,
        /// Queries before a created group reports ownership.
        #[arg(long, default_value = "2")]
        ready_after: u32,
        /// Fail group creation with this reason code.
        #[arg(long)]
        fail_create: Option<u32>,
        /// Fail group removal with this reason code.
        #[arg(long)]
        fail_remove: Option<u32>,
        /// Per-call latency in ms.
        #[arg(long, default_value = "50")]
        latency_ms: u64,
        /// Keep the group up until Ctrl-C instead of stopping right away.
        #[arg(long)]
        hold: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = HotspotConfig::new();
    if let Some(ms) = cli.backoff_base_ms {
        config = config.backoff_base(Duration::from_millis(ms));
    }
    if let Some(retries) = cli.max_retries {
        config = config.max_retries(retries);
    }

    eprintln!("hotspotctl v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Up { iface, ctrl_dir } => {
            let mut service = WpaCliGroupService::new(iface.clone());
            if let Some(dir) = ctrl_dir {
                service = service.ctrl_dir(dir);
            }
            eprintln!("Control interface: {iface}");
            run(Arc::new(service), config, cli.json, true).await
        }
        Command::Sim {
            existing,
            ready_after,
            fail_create,
            fail_remove,
            latency_ms,
            hold,
        } => {
            let behavior = SimulatedBehavior {
                existing: existing.map(|e| match e {
                    ExistingGroup::Owner => Group::owned("DIRECT-existing", "existing-passphrase"),
                    ExistingGroup::Client => Group::client("DIRECT-foreign"),
                }),
                ready_after,
                create_failure: fail_create.map(FailureReason),
                remove_failure: fail_remove.map(FailureReason),
                latency: Duration::from_millis(latency_ms),
                ..Default::default()
            };
            run(
                Arc::new(SimulatedGroupService::new(behavior)),
                config,
                cli.json,
                hold,
            )
            .await
        }
    }
}

/// Start the hotspot, report progress, then stop (after Ctrl-C when `hold`).
async fn run<S>(service: Arc<S>, config: HotspotConfig, json: bool, hold: bool) -> anyhow::Result<()>
where
    S: GroupService + 'static,
{
    let HotspotChannels { handle, mut events } =
        HotspotController::spawn(service, Arc::new(LogPresenter::new(json)), config)
            .context("invalid configuration")?;

    let outcome = handle.start().await?;
    if !outcome.is_accepted() {
        bail!("start not accepted: {outcome:?}");
    }

    // Wait for the start attempt to settle.
    let mut active = false;
    while let Some(event) = events.recv().await {
        report(&event, json);
        match event {
            HotspotEvent::StatusChanged {
                status: Status::Active,
            } => {
                active = true;
                break;
            }
            HotspotEvent::StatusChanged {
                status: Status::Idle,
            } => break,
            _ => {}
        }
    }

    if !active {
        handle.teardown().await?;
        bail!("hotspot did not come up");
    }

    if hold {
        eprintln!("Hotspot up. Press Ctrl-C to stop.");
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("waiting for Ctrl-C")?,
            _ = drain(&mut events, json) => {}
        }
    }

    handle.stop().await?;
    while let Some(event) = events.recv().await {
        report(&event, json);
        match event {
            HotspotEvent::StatusChanged {
                status: Status::Idle,
            } => break,
            HotspotEvent::Error { .. } => break,
            _ => {}
        }
    }

    handle.teardown().await?;
    while let Some(event) = events.recv().await {
        report(&event, json);
    }
    eprintln!("Final status: {}", handle.status());
    Ok(())
}

/// Keep reporting events until the channel closes.
async fn drain(events: &mut tokio::sync::mpsc::Receiver<HotspotEvent>, json: bool) {
    while let Some(event) = events.recv().await {
        report(&event, json);
    }
}

fn report(event: &HotspotEvent, json: bool) {
    if json {
        events::emit_event(event);
        return;
    }
    match event {
        HotspotEvent::StatusChanged { status } => eprintln!("Status: {status}"),
        HotspotEvent::GroupAvailable { group } => {
            eprintln!("Network:    {}", group.network_name);
            eprintln!("Passphrase: {}", group.passphrase);
            if let Some(iface) = &group.interface {
                eprintln!("Interface:  {iface}");
            }
        }
        HotspotEvent::Error { message, .. } => eprintln!("Error: {message}"),
    }
}

#![forbid(unsafe_code)]

use clap::Parser;
use corvus_switch_lib::{
    config::load_from_path, show, spawn_updater, telemetry, Bridge, BridgeRegistry, DpEvent,
};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Corvus OpenFlow 1.3 software datapath")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "etc/corvus.toml")]
    config: PathBuf,

    /// Print the flow dump once after startup and exit
    #[arg(long)]
    dump: bool,
}

fn main() {
    let cli = Cli::parse();
    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            telemetry::init_tracing(&Default::default());
            error!(%err, "failed to load configuration");
            std::process::exit(1);
        }
    };
    telemetry::init_tracing(&cfg.logging);
    info!(bridge = %cfg.bridge, dpid = cfg.dpid, "configuration loaded");

    let (bridge, events) = Bridge::new(&cfg, Default::default());
    let mut registry = BridgeRegistry::new();
    registry.register(bridge.clone());

    if cli.dump {
        print!("{}", show::dump_all(&registry));
        print!("{}", show::dump_flowcache(&bridge));
        return;
    }

    let updater = match spawn_updater(bridge.clone()) {
        Ok(handle) => handle,
        Err(err) => {
            error!(%err, "failed to start updater thread");
            std::process::exit(1);
        }
    };
    info!("datapath running; draining agent events");

    // The OpenFlow agent is an external collaborator feeding flow mods
    // through the Bridge handle; this daemon logs the outbound events
    // until every sender is gone (or the process is interrupted).
    while let Ok(event) = events.recv() {
        match event {
            DpEvent::FlowRemoved { table_id, reason, priority, .. } => {
                info!(table_id, reason, priority, "flow removed");
            }
            DpEvent::BarrierReply { xid, .. } => info!(xid, "barrier reply"),
            DpEvent::PacketIn { in_port, .. } => info!(in_port, "packet in"),
        }
    }
    info!("event queue closed; shutting down");
    updater.shutdown();
}

// src/main.rs
//! mm-nmea-bridge - feed ModemManager NMEA output to gpsd through a pty

use anyhow::Context;
use clap::Parser;
use mm_nmea_bridge::{
    gpsd::GpsdControl, logging, modem::SystemModemManager, shutdown::Termination, Bridge,
    BridgeConfig, BridgeError, Owner,
};
use std::{path::PathBuf, process::ExitCode};

/// Bridge ModemManager NMEA output to gpsd via a PTY
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// ModemManager modem index; the first GPS NMEA-capable modem is used when omitted
    modem: Option<u32>,

    /// Configuration file [default: /etc/mm-nmea-bridge/config.json]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path of the symlink gpsd opens
    #[arg(long)]
    alias: Option<PathBuf>,

    /// Group given read/write access to the pty
    #[arg(long)]
    group: Option<String>,

    /// Do not start gpsd or register the pty with it
    #[arg(long)]
    no_gpsd: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    if !nix::unistd::geteuid().is_root() {
        eprintln!("{}", BridgeError::NotPrivileged);
        return ExitCode::FAILURE;
    }

    logging::init(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = BridgeConfig::load(args.config.as_deref())?;
    if let Some(alias) = args.alias {
        config.update_alias(alias);
    }
    if let Some(group) = args.group {
        config.update_group(group);
    }
    if args.no_gpsd {
        config.disable_gpsd();
    }

    let owner = Owner::root_with_group(&config.gps_group)?;
    let termination = Termination::install().context("installing signal handlers")?;

    let manager = SystemModemManager::connect()
        .await
        .context("connecting to the D-Bus system bus")?;

    let gpsd = config
        .gpsd
        .enabled
        .then(|| GpsdControl::new(config.gpsd.clone()));

    let mut bridge = Bridge::new(config);
    bridge
        .run(&manager, &gpsd, args.modem, owner, termination.recv())
        .await?;

    Ok(())
}

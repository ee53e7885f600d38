mod cli;
mod config;
mod locate_util;

use anyhow::{Context, Result};
use bf_prog::transport::Transport;
use bf_prog::RadioSession;
use clap::{CommandFactory, Parser};
use tracing::{debug, info, info_span};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::cli::{Cli, Command, RadioCommand, SerialArgs};

const DEFAULT_ENV_FILTER: &str = "info";

fn list_ports() -> Result<()> {
    let ports = locate_util::list_ports()?;
    if ports.is_empty() {
        info!("No serial ports found");
    }

    for port in ports {
        let marker = if locate_util::likely_programming_cable(&port) {
            "*"
        } else {
            " "
        };
        info!("{} {}", marker, locate_util::describe_port(&port));
    }

    Ok(())
}

fn run_radio(serial: &SerialArgs, command: RadioCommand) -> Result<()> {
    let config = config::load_config().context("Failed to load the config")?;
    match (&config, config::config_path()) {
        (None, Some(path)) => debug!("No config file found at {}", path.display()),
        (Some(_), Some(path)) => info!("Valid config file found at {}", path.display()),
        (_, None) => debug!("No config directory on this platform"),
    }

    let settings = config
        .unwrap_or_default()
        .serial
        .merged(&serial.as_config())
        .settings();

    let port = locate_util::find_port(settings.port.as_deref())
        .context("Failed to find the programming cable")?;

    let transport = info_span!("open", port = %port)
        .in_scope(|| Transport::open(&port, &settings.transport))
        .with_context(|| format!("Failed to open {}", port))?;
    let mut session = RadioSession::with_block_size(transport, settings.block_size)
        .context("Invalid session settings")?;

    let res = (|| {
        let handshake = session
            .handshake()
            .context("Failed to enter programming mode")?;

        command.run(&mut session, &handshake)
    })();

    // the port is closed on drop, whatever happened above
    drop(session.close());
    debug!("Closed {}", port);

    res
}

fn main() -> Result<()> {
    #[cfg(windows)]
    let _enabled = ansi_term::enable_ansi_support();

    let indicatif_layer = IndicatifLayer::new();

    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_ENV_FILTER))
        .with_subscriber(
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(indicatif_layer.get_stdout_writer()),
                )
                .with(indicatif_layer),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Radio(command) => run_radio(&cli.serial, command),
        Command::Ports => list_ports(),
        Command::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                env!("CARGO_BIN_NAME"),
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

//! Shed card-game server entry point.
//!
//! Resolves configuration (defaults → config file → command line), sets up
//! logging and signal handling, and hands off to the library's server core.

mod config;
mod logging;

use anyhow::{bail, Error};
use ctrlc::set_handler;
use pico_args::Arguments;
use shed::Server;

use config::ServerConfig;

const HELP: &str = "\
Run a shed card-game server

USAGE:
  shed_server [OPTIONS]

OPTIONS:
  --config FILE   Load configuration from FILE  [default: server.conf]
  --ip ADDR       Listener bind address (overrides config file)
  --port N        Listener port (overrides config file)

FLAGS:
  -h, --help      Print help information
";

const DEFAULT_CONFIG_FILE: &str = "server.conf";

fn main() -> Result<(), Error> {
    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let config_path: Option<String> = pargs.opt_value_from_str("--config")?;
    let ip_override: Option<String> = pargs.opt_value_from_str("--ip")?;
    let port_override: Option<u16> = pargs.opt_value_from_str("--port")?;
    let remaining = pargs.finish();
    if !remaining.is_empty() {
        bail!("unknown arguments: {remaining:?}\n{HELP}");
    }

    let mut config = ServerConfig::default();
    config.load_from_file(config_path.as_deref().unwrap_or(DEFAULT_CONFIG_FILE));
    if let Some(ip) = ip_override {
        config.ip = ip;
    }
    if let Some(port) = port_override {
        config.port = port;
    }
    config.validate()?;

    logging::init(&config);
    tracing::info!(
        ip = %config.ip,
        port = config.port,
        max_rooms = config.max_rooms,
        log_file = %config.log_file,
        file_logging = config.enable_file_logging,
        player_timeout_seconds = config.player_timeout_seconds,
        heartbeat_check_interval = config.heartbeat_check_interval,
        grace_period_seconds = config.grace_period_seconds,
        "starting shed server"
    );

    let server = Server::bind(config.to_core_config())?;
    let handle = server.shutdown_handle();
    set_handler(move || handle.shutdown())?;

    server.run()?;
    tracing::info!("clean shutdown");
    Ok(())
}

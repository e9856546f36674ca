use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Arg, Command};
use tracing::{error, info};

use surrogate::config::{self, SurrogateConfig};
use surrogate_core::{Controller, NoopApplicationHandler};

fn validate_bind_value(value: &str) -> Result<Ipv4Addr, String> {
    value.parse::<Ipv4Addr>().map_err(|_| "invalid IPv4 address".to_owned())
}

fn validate_alive_time_value(value: &str) -> Result<u32, String> {
    let secs: u32 = value.parse().map_err(|_| "invalid alive-time value".to_owned())?;
    if (1..=60).contains(&secs) {
        Ok(secs)
    } else {
        Err("alive-time must be between 1 and 60 seconds".to_owned())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "surrogate starting");

    let matches = Command::new("surrogate")
        .version(env!("CARGO_PKG_VERSION"))
        .author("iwismer <isaac@iwismer.ca>")
        .about("Emulates a MOM control-surface device for DADman hosts")
        .arg(
            Arg::new("config")
                .help("Path to the TOML configuration file")
                .short('c')
                .long("config")
                .default_value(config::DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("bind")
                .help("Local interface address to bind the control and discovery sockets to")
                .long("bind")
                .value_parser(validate_bind_value),
        )
        .arg(
            Arg::new("alive_time")
                .help("Keep-alive interval in seconds, [1, 60]")
                .long("alive-time")
                .value_parser(validate_alive_time_value),
        )
        .arg(
            Arg::new("restrict_host")
                .help("Restrict control connections and discovery replies to this host")
                .long("restrict-host"),
        )
        .get_matches();

    let config_path = PathBuf::from(matches.get_one::<String>("config").expect("config has a default"));

    let mut app_config = match config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(err) => {
            if config_path == PathBuf::from(config::DEFAULT_CONFIG_PATH) {
                info!(path = %config_path.display(), "no configuration file found, using built-in defaults");
            } else {
                error!(path = %config_path.display(), error = %err, "failed to load configuration file");
            }
            SurrogateConfig::default()
        }
    };

    if let Some(bind) = matches.get_one::<Ipv4Addr>("bind") {
        app_config.local_interface_address = Some(*bind);
    }
    if let Some(alive_time) = matches.get_one::<u32>("alive_time") {
        app_config.alive_time = *alive_time;
    }
    if let Some(host) = matches.get_one::<String>("restrict_host") {
        app_config.restrict_to_specified_host = Some(host.clone());
    }

    let alive_time = app_config.alive_time;
    let overrides = app_config.to_overrides();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build the surrogate runtime");
    let local = tokio::task::LocalSet::new();

    local.block_on(&runtime, async move {
        let controller = Controller::create(overrides, Box::new(NoopApplicationHandler));
        controller.0.borrow_mut().set_alive_time(alive_time);

        if let Err(err) = controller.begin_discoverability().await {
            error!(error = %err, "failed to start discoverability");
            return;
        }
        info!(alive_time, "surrogate is discoverable and accepting control connections");

        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received, closing listeners and peers");
        controller.end_discoverability();
    });
}

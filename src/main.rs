use clap::Parser;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

use ripd::cli::{Cli, CliFormatter, Commands, ConfigAction};
use ripd::config_manager::{ConfigManager, InterfaceConfig as ConfigInterface, RouterConfig};
use ripd::host::Host;
use ripd::metrics::Metrics;
use ripd::network::{self, UdpHost};
use ripd::router::{RipCore, RipTimers};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    CliFormatter::print_banner();

    match cli.command {
        Some(Commands::Start { config }) => start_router(config).await?,
        Some(Commands::Config { action }) => handle_config_command(action).await?,
        None => start_router("ripd.json".to_string()).await?,
    }

    Ok(())
}

/// Parse `RouterConfig::interfaces` (a CIDR-string address form) into the
/// `network::InterfaceConfig` shape `UdpHost::bind` expects.
fn to_network_interfaces(config: &RouterConfig) -> Result<Vec<network::InterfaceConfig>, Box<dyn std::error::Error + Send + Sync>> {
    config
        .interfaces
        .iter()
        .map(|intf| parse_interface(intf, config.rip.port))
        .collect()
}

fn parse_interface(
    intf: &ConfigInterface,
    port: u16,
) -> Result<network::InterfaceConfig, Box<dyn std::error::Error + Send + Sync>> {
    let (ip_str, prefix_str) = intf
        .address
        .split_once('/')
        .ok_or_else(|| format!("interface {} address {} is not CIDR form", intf.name, intf.address))?;
    let ip_address = ip_str.parse()?;
    let prefix: u8 = prefix_str.parse()?;
    Ok(network::InterfaceConfig {
        name: intf.name.clone(),
        ip_address,
        subnet_mask: network::utils::prefix_length_to_mask(prefix),
        port,
        cost: intf.cost,
        enabled: intf.enabled,
    })
}

async fn start_router(config_path: String) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("starting ripd with config: {}", config_path);

    let (manager, mut config_rx) = ConfigManager::new(&config_path).await?;
    let manager = Arc::new(manager);
    let config = manager.get_config().await;

    let metrics = Metrics::new();
    metrics.set_config_version(manager.get_config_version().await);

    let interfaces = to_network_interfaces(&config)?;
    let udp_host = UdpHost::bind(&interfaces)?;
    let host: Arc<dyn Host> = udp_host.clone();

    let timers = RipTimers {
        advertise_interval: Duration::from_secs(config.rip.advertise_interval_secs.max(1)),
        timeout: Duration::from_secs(config.rip.timeout_secs.max(1)),
    };
    let core = RipCore::init(host, metrics.clone(), timers);
    CliFormatter::print_success(&format!("engine initialized with {} route(s)", core.route_count()));

    let recv_handles = udp_host.spawn_receive_threads(Arc::clone(&core));
    info!("listening on {} interface(s)", recv_handles.len());

    // Config hot-reload: react to interface enable/disable and cost edits by
    // driving the same `interface_changed` entry point the host's own
    // interface-event thread would use.
    let reload_host = Arc::clone(&udp_host);
    let reload_core = Arc::clone(&core);
    let reload_metrics = metrics.clone();
    let reload_manager = Arc::clone(&manager);
    tokio::spawn(async move {
        let mut previous = config.interfaces.clone();
        while config_rx.changed().await.is_ok() {
            let new_config = config_rx.borrow().clone();
            reload_metrics.set_config_version(reload_manager.get_config_version().await);
            for (index, new_intf) in new_config.interfaces.iter().enumerate() {
                let Some(old_intf) = previous.get(index) else {
                    continue;
                };
                let state_changed = reload_host.set_enabled(index as u32, new_intf.enabled);
                let cost_changed = reload_host.set_cost(index as u32, new_intf.cost);
                if old_intf.enabled != new_intf.enabled || old_intf.cost != new_intf.cost {
                    reload_core.interface_changed(index as u32, state_changed, cost_changed && !state_changed);
                }
            }
            previous = new_config.interfaces;
            info!("configuration reloaded");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("received shutdown signal");
    core.shutdown();
    Ok(())
}

async fn handle_config_command(action: ConfigAction) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match action {
        ConfigAction::Validate { file } => {
            let content = tokio::fs::read_to_string(&file).await?;
            let config: RouterConfig = serde_json::from_str(&content)?;
            let validation = ConfigManager::validate_config(&config);
            if validation.is_valid() {
                CliFormatter::print_success("configuration is valid");
                for warning in &validation.warnings {
                    CliFormatter::print_warning(warning);
                }
            } else {
                CliFormatter::print_error("configuration is invalid");
                for error in &validation.errors {
                    warn!("  - {}", error);
                }
                std::process::exit(1);
            }
        }
        ConfigAction::Generate { output } => {
            let default_config = RouterConfig::default();
            let json = serde_json::to_string_pretty(&default_config)?;
            tokio::fs::write(&output, json).await?;
            CliFormatter::print_success(&format!("default configuration written to {}", output));
        }
    }
    Ok(())
}

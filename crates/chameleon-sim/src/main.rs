//! chameleon-sim: in-process rendezvous simulator.
//!
//! Starts a shared in-memory store with its lease reaper and closed-session
//! janitor, then runs a number of simulated clients that match with each
//! other, exchange greetings, and leave or vanish.

mod cli;
mod client;
mod housekeeping;
mod settings;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use chameleon_config::ChameleonConfig;
use chameleon_social::{ClientIdentity, MemoryStore};

use crate::client::{run_client, ClientReport};
use crate::settings::SimSettings;

fn load_config(args: &cli::Args) -> chameleon_common::Result<ChameleonConfig> {
    let config = match &args.config {
        Some(path) => chameleon_config::load_config_from(path)?,
        None => chameleon_config::load_config()?,
    };
    Ok(config)
}

/// Persisted identity for client `index`. Without `--identity-dir` the
/// first client stands in for this device and the rest are throwaway.
fn client_identity(args: &cli::Args, index: u32) -> chameleon_common::Result<ClientIdentity> {
    let path = match &args.identity_dir {
        Some(dir) => dir.join(format!("client-{index}.json")),
        None if index == 0 => ClientIdentity::default_path()?,
        None => return Ok(ClientIdentity::generate()),
    };
    Ok(ClientIdentity::load_or_create(&path)?)
}

/// `--log-level` wins, then `RUST_LOG`, then the config file.
fn log_filter(args: &cli::Args, config: &ChameleonConfig) -> EnvFilter {
    if let Some(level) = &args.log_level {
        return EnvFilter::new(level);
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
}

fn summarize(reports: &[ClientReport]) {
    let matches: u32 = reports.iter().map(|r| r.matches).sum();
    let sent: u32 = reports.iter().map(|r| r.messages_sent).sum();
    let received: usize = reports.iter().map(|r| r.messages_received).sum();
    let partner_left: u32 = reports.iter().map(|r| r.partner_left).sum();
    let dropped: u32 = reports.iter().map(|r| r.dropped).sum();
    let errors: u32 = reports.iter().map(|r| r.errors).sum();
    tracing::info!(
        clients = reports.len(),
        matches,
        sent,
        received,
        partner_left,
        dropped,
        errors,
        "Simulation finished"
    );
}

#[tokio::main]
async fn main() {
    let args = cli::parse();
    let (config, config_error) = match load_config(&args) {
        Ok(config) => (config, None),
        Err(e) => (ChameleonConfig::default(), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&args, &config))
        .init();

    tracing::info!("chameleon-sim v{} starting", env!("CARGO_PKG_VERSION"));
    if let Some(e) = config_error {
        tracing::warn!("Config load failed, using defaults: {e}");
    }

    let settings = SimSettings::from_config(&config);
    let clients = args.clients.unwrap_or(config.sim.clients).max(2);
    let store = MemoryStore::new();
    let cancel = CancellationToken::new();

    let reaper = housekeeping::spawn_reaper(
        store.clone(),
        settings.lease,
        settings.reaper_interval,
        cancel.clone(),
    );
    let janitor = housekeeping::spawn_janitor(
        store.clone(),
        settings.coordinator.paths.clone(),
        settings.closed_grace,
        settings.sweep_interval,
        cancel.clone(),
    );

    tracing::info!(clients, rounds = args.rounds, "Starting clients");
    let tasks = (0..clients).map(|index| {
        tokio::spawn(run_client(
            store.clone(),
            client_identity(&args, index).unwrap_or_else(|e| {
                tracing::warn!(client = index, error = %e, "Identity unavailable, using a fresh one");
                ClientIdentity::generate()
            }),
            args.rounds,
            settings.clone(),
            cancel.clone(),
        ))
    });

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, finishing current rounds");
            ctrl_c_cancel.cancel();
        }
    });

    let reports: Vec<ClientReport> = join_all(tasks)
        .await
        .into_iter()
        .filter_map(|joined| match joined {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Client task failed");
                None
            }
        })
        .collect();

    cancel.cancel();
    let _ = tokio::join!(reaper, janitor);
    summarize(&reports);
    tracing::info!("Shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chameleon_common::{ChameleonError, ConfigError};
    use clap::Parser;

    fn args(extra: &[&str]) -> cli::Args {
        cli::Args::parse_from(std::iter::once("chameleon-sim").chain(extra.iter().copied()))
    }

    #[test]
    fn missing_config_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = load_config(&args(&["--config", path.to_str().unwrap()])).unwrap_err();
        assert!(matches!(
            err,
            ChameleonError::Config(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn identity_dir_persists_one_identity_per_client() {
        let dir = tempfile::tempdir().unwrap();
        let args = args(&["--identity-dir", dir.path().to_str().unwrap()]);

        let first = client_identity(&args, 1).unwrap();
        let again = client_identity(&args, 1).unwrap();
        let other = client_identity(&args, 2).unwrap();

        assert_eq!(first.id, again.id);
        assert_ne!(first.id, other.id);
        assert!(dir.path().join("client-1.json").exists());
    }

    #[test]
    fn corrupt_identity_file_is_an_identity_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("client-3.json"), "not json").unwrap();
        let args = args(&["--identity-dir", dir.path().to_str().unwrap()]);
        let err = client_identity(&args, 3).unwrap_err();
        assert!(matches!(err, ChameleonError::Identity(_)));
    }

    #[test]
    fn log_level_flag_overrides_config() {
        let config = ChameleonConfig::default();
        let filter = log_filter(&args(&["--log-level", "chameleon_social=trace"]), &config);
        assert_eq!(filter.to_string(), "chameleon_social=trace");
    }

    #[test]
    fn rust_log_wins_over_config_level() {
        std::env::set_var("RUST_LOG", "chameleon_sim=warn");
        let mut config = ChameleonConfig::default();
        config.logging.level = "chameleon=debug".into();
        let filter = log_filter(&args(&[]), &config);
        std::env::remove_var("RUST_LOG");
        assert_eq!(filter.to_string(), "chameleon_sim=warn");
    }
}

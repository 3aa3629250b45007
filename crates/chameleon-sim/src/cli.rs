use std::path::PathBuf;

use clap::Parser;

/// chameleon-sim: drive simulated strangers through random chat sessions.
#[derive(Parser, Debug)]
#[command(name = "chameleon-sim", version, about)]
pub struct Args {
    /// Number of simulated clients (defaults to `sim.clients` from config).
    #[arg(short, long)]
    pub clients: Option<u32>,

    /// Match rounds each client plays.
    #[arg(short, long, default_value_t = 3)]
    pub rounds: u32,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding one persisted identity file per client. Without
    /// it only the first client keeps this device's identity.
    #[arg(long)]
    pub identity_dir: Option<PathBuf>,

    /// Log level override (e.g. `chameleon=debug`).
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = Args::parse_from([
            "chameleon-sim",
            "--clients",
            "6",
            "--rounds",
            "2",
            "--config",
            "/tmp/c.toml",
        ]);
        assert_eq!(args.clients, Some(6));
        assert_eq!(args.rounds, 2);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(args.identity_dir.is_none());
    }

    #[test]
    fn defaults() {
        let args = Args::parse_from(["chameleon-sim"]);
        assert_eq!(args.clients, None);
        assert_eq!(args.rounds, 3);
    }
}

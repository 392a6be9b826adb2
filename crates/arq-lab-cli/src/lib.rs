//! Plumbing shared by the `arq-*` binaries.

use anyhow::{Context, Result};
use arq_lab_abstract::{ArqConfig, ArqConfigOverride};
use arq_lab_core::{DuplicatePolicy, TransferReport};
use clap::ValueEnum;
use std::fs;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Console logging; `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub fn load_override(path: &Path) -> Result<ArqConfigOverride> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Defaults, then the optional TOML file, then command-line flags.
pub fn resolve_config(file: Option<&Path>, flags: &ArqConfigOverride) -> Result<ArqConfig> {
    let mut config = ArqConfig::default();
    if let Some(path) = file {
        load_override(path)?.apply_to(&mut config);
    }
    flags.apply_to(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Resolve a host name or literal address, preferring IPv4.
pub async fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr> {
    let candidates: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve {host}"))?
        .collect();
    candidates
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .with_context(|| format!("{host} did not resolve to any address"))
}

/// Wildcard address of the same family as `peer`, on an OS-chosen port.
pub fn ephemeral_bind_for(peer: SocketAddr) -> SocketAddr {
    match peer {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    }
}

pub fn write_trace(path: &Path, report: &TransferReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize transfer trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}

/// Command-line spelling of [`DuplicatePolicy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Re-acknowledge the last delivered packet.
    #[default]
    Reack,
    /// Jump to the duplicate's ack number.
    Resync,
}

impl From<PolicyArg> for DuplicatePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Reack => DuplicatePolicy::ReackLastGood,
            PolicyArg::Resync => DuplicatePolicy::Resync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("arq-lab-cli-{}-{name}", std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn flags_win_over_config_file() {
        let path = scratch_file("override.toml", "timeout_ms = 300\ndrop_percent = 20\n");
        let flags = ArqConfigOverride {
            drop_percent: Some(5),
            ..Default::default()
        };
        let config = resolve_config(Some(&path), &flags).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.timeout_ms, 300);
        assert_eq!(config.drop_percent, 5);
        assert_eq!(config.packet_size, 512);
    }

    #[test]
    fn invalid_result_is_reported() {
        let flags = ArqConfigOverride {
            packet_size: Some(8),
            ..Default::default()
        };
        let err = resolve_config(None, &flags).unwrap_err();
        assert!(format!("{err:#}").contains("packet size 8"));
    }

    #[test]
    fn unreadable_config_names_the_file() {
        let path = scratch_file("broken.toml", "timeout_ms = \"soon\"");
        let err = resolve_config(Some(&path), &ArqConfigOverride::default()).unwrap_err();
        fs::remove_file(&path).unwrap();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn policy_arg_maps_to_engine_policy() {
        assert_eq!(
            DuplicatePolicy::from(PolicyArg::default()),
            DuplicatePolicy::ReackLastGood
        );
        assert_eq!(
            DuplicatePolicy::from(PolicyArg::Resync),
            DuplicatePolicy::Resync
        );
    }

    #[test]
    fn ephemeral_bind_matches_family() {
        let v4: SocketAddr = "10.0.0.1:9000".parse().unwrap();
        let v6: SocketAddr = "[::1]:9000".parse().unwrap();
        assert_eq!(ephemeral_bind_for(v4), "0.0.0.0:0".parse().unwrap());
        assert_eq!(ephemeral_bind_for(v6), "[::]:0".parse().unwrap());
    }

    #[tokio::test]
    async fn literal_address_resolves_without_dns() {
        let addr = resolve_addr("127.0.0.1", 4242).await.unwrap();
        assert_eq!(addr, SocketAddr::from(([127, 0, 0, 1], 4242)));
    }
}

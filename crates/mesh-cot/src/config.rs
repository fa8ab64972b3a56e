/// Process-wide settings, read once at startup from the environment or the command line.
use std::{
    net::{SocketAddr, ToSocketAddrs},
    path::PathBuf,
};

use chrono::TimeDelta;
use clap::Parser;

use crate::{protocol::cot::UnitProfile, Error, MCResult};

/// Forward mesh radio position reports to a TAK network as CoT events
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// CoT destination address (defaults to the TAK SA multicast group)
    #[arg(long, env = "ATAK_HOST", default_value = "239.2.3.1")]
    pub atak_host: String,

    /// CoT destination port
    #[arg(long, env = "ATAK_PORT", default_value_t = 6969)]
    pub atak_port: u16,

    /// Verbose logging when nonzero
    #[arg(long, env = "DEBUG", default_value_t = 0)]
    pub debug: u8,

    /// CoT marker type
    #[arg(long, env = "UNIT_TYPE", default_value = "a-f-G-U-C")]
    pub unit_type: String,

    /// Team (group) name
    #[arg(long, env = "UNIT_TEAM", default_value = "Green")]
    pub unit_team: String,

    /// Team role
    #[arg(long, env = "UNIT_ROLE", default_value = "Team Member")]
    pub unit_role: String,

    /// Remarks attached to every event
    #[arg(long, env = "COT_REMARKS", default_value = "")]
    pub remarks: String,

    /// Seconds until an event goes stale
    #[arg(
        long,
        env = "COT_STALE_SECS",
        default_value_t = 120,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub stale_secs: u32,

    /// IP TTL for multicast datagrams
    #[arg(long, env = "ATAK_MCAST_TTL", default_value_t = 1)]
    pub mcast_ttl: u32,

    /// Decoded mesh notifications as JSON lines ("-" reads stdin)
    #[arg(long, env = "MESH_INPUT", default_value = "-")]
    pub input: PathBuf,
}

impl Config {
    pub fn verbose(&self) -> bool {
        self.debug != 0
    }

    /// Per-event constants shared by every CoT event of this run.
    pub fn unit_profile(&self) -> UnitProfile {
        UnitProfile {
            cot_type: self.unit_type.clone(),
            team: self.unit_team.clone(),
            role: self.unit_role.clone(),
            remarks: self.remarks.clone(),
            stale: TimeDelta::seconds(self.stale_secs.into()),
        }
    }

    /// Resolve the destination once. The first address returned by the resolver wins.
    pub fn destination(&self) -> MCResult<SocketAddr> {
        (self.atak_host.as_str(), self.atak_port)
            .to_socket_addrs()
            .map_err(|e| Error::Config(format!("resolve {}: {e}", self.atak_host)))?
            .next()
            .ok_or_else(|| Error::Config(format!("no address for {}", self.atak_host)))
    }
}

#[cfg(test)]
mod test {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("mesh2cot").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cfg = parse(&[]);
        assert_eq!(cfg.atak_port, 6969);
        let profile = cfg.unit_profile();
        assert_eq!(profile.cot_type, "a-f-G-U-C");
        assert_eq!(profile.team, "Green");
        assert_eq!(profile.role, "Team Member");
        assert_eq!(profile.remarks, "");
        assert_eq!(profile.stale, TimeDelta::seconds(120));
    }

    #[test]
    fn test_overrides() {
        let cfg = parse(&[
            "--atak-host",
            "127.0.0.1",
            "--atak-port",
            "4242",
            "--debug",
            "1",
            "--unit-team",
            "Cyan",
            "--stale-secs",
            "30",
        ]);
        assert!(cfg.verbose());
        assert_eq!(cfg.unit_profile().team, "Cyan");
        assert_eq!(cfg.unit_profile().stale, TimeDelta::seconds(30));
        let dest = cfg.destination().unwrap();
        assert_eq!(dest.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(dest.port(), 4242);
    }

    #[test]
    fn test_default_destination_is_multicast() {
        let dest = parse(&[]).destination().unwrap();
        assert!(dest.ip().is_multicast());
        assert_eq!(dest.port(), 6969);
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(Config::try_parse_from(["mesh2cot", "--atak-port", "70000"]).is_err());
        // an event must outlive its start time
        assert!(Config::try_parse_from(["mesh2cot", "--stale-secs", "0"]).is_err());
    }
}

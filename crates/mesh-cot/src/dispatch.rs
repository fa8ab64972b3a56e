/// Turns mesh position packets into CoT events and sends them.
///
/// Each packet is handled on its own: extract, build, encode, send. Nothing carries over from one
/// packet to the next apart from the read-only [`UnitProfile`].
use std::sync::mpsc::Receiver;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    protocol::cot::{CotEvent, Hae, Marker, UnitProfile},
    source::{MeshEvent, MeshPacket},
    transport::CotSink,
    MCResult,
};

/// Fixed leading 10 bytes of every UID. The node number fills the remaining 6, so a node keeps
/// the same UID on every installation.
pub const UID_ROOT: &str = "7ea452c5-a1ec-571c-a7ac";

pub const CALLSIGN_PREFIX: &str = "mesh-";

pub fn uid_for(node: u32) -> String {
    format!("{UID_ROOT}-00{node:08x}")
}

pub fn callsign_for(node: u32) -> String {
    format!("{CALLSIGN_PREFIX}{node:08x}")
}

//  _____
// |_   _|   _ _ __   ___  ___
//   | || | | | '_ \ / _ \/ __|
//   | || |_| | |_) |  __/\__ \
//   |_| \__, | .__/ \___||___/
//       |___/|_|

/// The fields of a position packet that feed a CoT event.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub source_id: u32,
    pub lat: f64,
    pub lon: f64,
    /// Mean sea level, as reported. Never used as HAE.
    pub altitude_msl: Option<f64>,
    pub battery: Option<u32>,
}

impl TelemetryRecord {
    /// `None` unless the packet carries a position with both latitude and longitude.
    pub fn from_packet(packet: &MeshPacket) -> Option<Self> {
        let position = packet.decoded.as_ref()?.position.as_ref()?;
        Some(Self {
            source_id: packet.from,
            lat: position.lat()?,
            lon: position.lon()?,
            altitude_msl: position.altitude,
            battery: position.battery_level,
        })
    }

    pub fn marker(&self) -> Marker {
        Marker {
            uid: uid_for(self.source_id),
            callsign: callsign_for(self.source_id),
            lat: self.lat,
            lon: self.lon,
            // MSL altitude with no geoid height available can't be turned into HAE
            hae: Hae::Unknown,
            battery: self.battery,
        }
    }
}

/// What became of one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    /// Packet without a usable position.
    Skipped,
    /// Notification that could not be decoded.
    Dropped,
    /// Encoding or sending failed.
    Failed,
    /// Connection or node notification.
    Lifecycle,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub packets: u64,
    pub sent: u64,
    pub skipped: u64,
    pub dropped: u64,
    pub failed: u64,
}

impl DispatchStats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Sent => self.sent += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Dropped => self.dropped += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Lifecycle => return,
        }
        self.packets += 1;
    }
}

//  ____  _                 _       _
// |  _ \(_)___ _ __   __ _| |_ ___| |__   ___ _ __
// | | | | / __| '_ \ / _` | __/ __| '_ \ / _ \ '__|
// | |_| | \__ \ |_) | (_| | || (__| | | |  __/ |
// |____/|_|___/ .__/ \__,_|\__\___|_| |_|\___|_|
//             |_|

pub struct Dispatcher<S> {
    profile: UnitProfile,
    sink: S,
}

impl<S: CotSink> Dispatcher<S> {
    pub fn new(profile: UnitProfile, sink: S) -> Self {
        Self { profile, sink }
    }

    pub fn profile(&self) -> &UnitProfile {
        &self.profile
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Build and send the event for one packet. `Ok(false)` means the packet had no usable
    /// position and nothing was sent.
    pub fn on_packet(&self, packet: &MeshPacket) -> MCResult<bool> {
        let Some(record) = TelemetryRecord::from_packet(packet) else {
            debug!("{:08x}: no position fix, skipping", packet.from);
            return Ok(false);
        };
        let cot = CotEvent::build(record.marker(), &self.profile, Utc::now());
        let bytes = cot.to_bytes()?;
        debug!("CoT: {}", String::from_utf8_lossy(&bytes));
        self.sink.send(&bytes)?;
        Ok(true)
    }

    /// Handle one notification from the mesh source. Never fails: per-packet problems are
    /// logged and reported through the returned [`Outcome`].
    pub fn handle(&self, event: MCResult<MeshEvent>) -> Outcome {
        match event {
            Ok(MeshEvent::Packet(packet)) => match self.on_packet(&packet) {
                Ok(true) => Outcome::Sent,
                Ok(false) => Outcome::Skipped,
                Err(e) => {
                    warn!("{:08x}: CoT not sent: {}", packet.from, e);
                    Outcome::Failed
                }
            },
            Ok(MeshEvent::Connected) => {
                info!("Connected to radio");
                Outcome::Lifecycle
            }
            Ok(MeshEvent::Disconnected) => {
                info!("Connection to radio lost");
                Outcome::Lifecycle
            }
            Ok(MeshEvent::Node(node)) => {
                match node.user {
                    Some(user) => info!(
                        "Node changed: {:08x} {} ({})",
                        node.num, user.long_name, user.short_name
                    ),
                    None => info!("Node changed: {:08x}", node.num),
                }
                Outcome::Lifecycle
            }
            Err(e) => {
                debug!("dropping undecodable notification: {}", e);
                Outcome::Dropped
            }
        }
    }

    /// Process notifications one at a time until the source closes.
    pub fn run(&self, events: Receiver<MCResult<MeshEvent>>) -> DispatchStats {
        let mut stats = DispatchStats::default();
        for event in events {
            stats.record(self.handle(event));
        }
        stats
    }
}

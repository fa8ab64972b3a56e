use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Serialize, Serializer};

use crate::{Error, MCResult};

/// Prepended verbatim to every encoded event.
pub const XML_DECL: &str = r#"<?xml version="1.0" standalone="yes"?>"#;

/// Value CoT uses for "not known" in `hae`, `ce` and `le`.
pub const UNSPECIFIED: f64 = 9_999_999.0;

pub const COT_VERSION: &str = "2.0";

/// `how` code for machine-generated, GPS-derived positions.
pub const HOW_GPS: &str = "m-g";

const COT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Settings shared by every event produced in a run.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitProfile {
    pub cot_type: String,
    pub team: String,
    pub role: String,
    pub remarks: String,
    pub stale: TimeDelta,
}

impl Default for UnitProfile {
    fn default() -> Self {
        Self {
            cot_type: "a-f-G-U-C".to_string(),
            team: "Green".to_string(),
            role: "Team Member".to_string(),
            remarks: String::new(),
            stale: TimeDelta::seconds(120),
        }
    }
}

/// Height above ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Hae {
    Unknown,
    Meters(f64),
}

impl fmt::Display for Hae {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hae::Unknown => write!(f, "{UNSPECIFIED:.1}"),
            Hae::Meters(m) => write!(f, "{m:.6}"),
        }
    }
}

impl Serialize for Hae {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Everything about one position report that varies per event.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub uid: String,
    pub callsign: String,
    pub lat: f64,
    pub lon: f64,
    pub hae: Hae,
    pub battery: Option<u32>,
}

/// A single CoT position event. Attribute fields must stay ahead of child elements for the XML
/// serializer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename = "event")]
pub struct CotEvent {
    #[serde(rename = "@version")]
    version: &'static str,
    #[serde(rename = "@uid")]
    uid: String,
    #[serde(rename = "@time", serialize_with = "cot_time")]
    time: DateTime<Utc>,
    #[serde(rename = "@start", serialize_with = "cot_time")]
    start: DateTime<Utc>,
    #[serde(rename = "@stale", serialize_with = "cot_time")]
    stale: DateTime<Utc>,
    #[serde(rename = "@type")]
    cot_type: String,
    #[serde(rename = "@how")]
    how: &'static str,
    point: Point,
    detail: Detail,
}

#[derive(Debug, Clone, Serialize)]
struct Point {
    #[serde(rename = "@lat", serialize_with = "fixed6")]
    lat: f64,
    #[serde(rename = "@lon", serialize_with = "fixed6")]
    lon: f64,
    #[serde(rename = "@hae")]
    hae: Hae,
    #[serde(rename = "@ce", serialize_with = "fixed1")]
    ce: f64,
    #[serde(rename = "@le", serialize_with = "fixed1")]
    le: f64,
}

#[derive(Debug, Clone, Serialize)]
struct Detail {
    contact: Contact,
    uid: DroidUid,
    remarks: String,
    #[serde(rename = "__group")]
    group: Group,
    takv: Takv,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<Status>,
    precisionlocation: PrecisionLocation,
}

#[derive(Debug, Clone, Serialize)]
struct Contact {
    #[serde(rename = "@callsign")]
    callsign: String,
}

/// Older ATAK releases look the callsign up here instead of in `contact`.
#[derive(Debug, Clone, Serialize)]
struct DroidUid {
    #[serde(rename = "@Droid")]
    droid: String,
}

#[derive(Debug, Clone, Serialize)]
struct Group {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@role")]
    role: String,
}

#[derive(Debug, Clone, Serialize)]
struct Takv {
    #[serde(rename = "@device")]
    device: &'static str,
    #[serde(rename = "@platform")]
    platform: &'static str,
    #[serde(rename = "@version")]
    version: &'static str,
    #[serde(rename = "@os")]
    os: &'static str,
}

const TAKV: Takv = Takv {
    device: "MESH2COT",
    platform: "ATAK",
    version: "3.8-COMPAT",
    os: "23",
};

#[derive(Debug, Clone, Serialize)]
struct Status {
    #[serde(rename = "@battery")]
    battery: u32,
}

#[derive(Debug, Clone, Serialize)]
struct PrecisionLocation {
    #[serde(rename = "@geopointsrc")]
    geopointsrc: &'static str,
    #[serde(rename = "@altsrc")]
    altsrc: &'static str,
}

fn cot_time<S: Serializer>(t: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&t.format(COT_TIME_FORMAT))
}

fn fixed6<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{v:.6}"))
}

fn fixed1<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{v:.1}"))
}

impl CotEvent {
    /// Build a GPS-sourced marker event valid from `now` until `now + profile.stale`.
    ///
    /// Coordinates are not range checked; whatever the radio reported is passed through.
    pub fn build(marker: Marker, profile: &UnitProfile, now: DateTime<Utc>) -> Self {
        let Marker {
            uid,
            callsign,
            lat,
            lon,
            hae,
            battery,
        } = marker;
        Self {
            version: COT_VERSION,
            uid,
            time: now,
            start: now,
            stale: now + profile.stale,
            cot_type: profile.cot_type.clone(),
            how: HOW_GPS,
            point: Point {
                lat,
                lon,
                hae,
                ce: UNSPECIFIED,
                le: UNSPECIFIED,
            },
            detail: Detail {
                contact: Contact {
                    callsign: callsign.clone(),
                },
                uid: DroidUid { droid: callsign },
                remarks: profile.remarks.clone(),
                group: Group {
                    name: profile.team.clone(),
                    role: profile.role.clone(),
                },
                takv: TAKV,
                status: battery.map(|battery| Status { battery }),
                precisionlocation: PrecisionLocation {
                    geopointsrc: "GPS",
                    altsrc: "GPS",
                },
            },
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn callsign(&self) -> &str {
        &self.detail.contact.callsign
    }

    pub fn cot_type(&self) -> &str {
        &self.cot_type
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn stale(&self) -> DateTime<Utc> {
        self.stale
    }

    pub fn hae(&self) -> Hae {
        self.point.hae
    }

    pub fn battery(&self) -> Option<u32> {
        self.detail.status.as_ref().map(|s| s.battery)
    }

    /// Encode as a single datagram payload: the XML declaration followed directly by the
    /// `<event>` tree, UTF-8.
    pub fn to_bytes(&self) -> MCResult<Vec<u8>> {
        let body = quick_xml::se::to_string(self).map_err(|e| Error::Serialize(e.to_string()))?;
        let mut bytes = Vec::with_capacity(XML_DECL.len() + body.len());
        bytes.extend_from_slice(XML_DECL.as_bytes());
        bytes.extend_from_slice(body.as_bytes());
        Ok(bytes)
    }
}

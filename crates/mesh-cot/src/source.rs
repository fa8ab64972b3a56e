/// Decoded mesh radio notifications.
///
/// The radio link and protobuf decoding belong to the mesh client. What reaches this crate is
/// its pub/sub stream rendered as JSON lines, one notification per line, tagged with the topic it
/// was published on.
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
    sync::mpsc::{self, Receiver},
    thread,
};

use serde::Deserialize;
use tracing::{debug, trace};

use crate::{Error, MCResult};

//  _____
// |_   _|   _ _ __   ___  ___
//   | || | | | '_ \ / _ \/ __|
//   | || |_| | |_) |  __/\__ \
//   |_| \__, | .__/ \___||___/
//       |___/|_|

/// One notification from the mesh client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "topic")]
pub enum MeshEvent {
    #[serde(rename = "meshtastic.receive")]
    Packet(MeshPacket),
    #[serde(rename = "meshtastic.connection.established")]
    Connected,
    #[serde(rename = "meshtastic.connection.lost")]
    Disconnected,
    #[serde(rename = "meshtastic.node")]
    Node(NodeInfo),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeshPacket {
    /// Node number of the sender.
    pub from: u32,
    #[serde(default)]
    pub decoded: Option<Decoded>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Decoded {
    #[serde(default)]
    pub position: Option<Position>,
}

/// Position sub-record. Radios routinely send partial fixes, so every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Degrees scaled by 1e7, as carried on the air.
    #[serde(rename = "latitudeI")]
    pub latitude_i: Option<i32>,
    #[serde(rename = "longitudeI")]
    pub longitude_i: Option<i32>,
    /// Meters above mean sea level.
    pub altitude: Option<f64>,
    pub battery_level: Option<u32>,
}

impl Position {
    pub fn lat(&self) -> Option<f64> {
        self.latitude
            .or_else(|| self.latitude_i.map(|v| f64::from(v) * 1e-7))
    }

    pub fn lon(&self) -> Option<f64> {
        self.longitude
            .or_else(|| self.longitude_i.map(|v| f64::from(v) * 1e-7))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeInfo {
    pub num: u32,
    #[serde(default)]
    pub user: Option<NodeUser>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUser {
    #[serde(default)]
    pub long_name: String,
    #[serde(default)]
    pub short_name: String,
}

pub fn decode_line(line: &str) -> MCResult<MeshEvent> {
    Ok(serde_json::from_str(line)?)
}

//      _ ____   ___  _   _   _     _
//     | / ___| / _ \| \ | | | |   (_)_ __   ___  ___
//  _  | \___ \| | | |  \| | | |   | | '_ \ / _ \/ __|
// | |_| |___) | |_| | |\  | | |___| | | | |  __/\__ \
//  \___/|____/ \___/|_| \_| |_____|_|_| |_|\___||___/

/// Iterator over the notifications in a JSON lines stream. Blank lines are skipped, a line that
/// fails to decode yields an error and iteration carries on. An I/O error is yielded once and
/// ends the stream.
pub struct JsonLines<R> {
    reader: R,
    line: String,
    done: bool,
}

impl<R: BufRead> JsonLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for JsonLines<R> {
    type Item = MCResult<MeshEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    let line = self.line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    trace!("mesh line: {}", line);
                    return Some(decode_line(line));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
        None
    }
}

/// Open the notification stream. `-` means stdin.
pub fn open_input(path: &Path) -> MCResult<Box<dyn BufRead + Send>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path)
        .map_err(|e| Error::Config(format!("cannot open {}: {e}", path.display())))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Read notifications on a dedicated thread and deliver them in arrival order. The channel
/// closes when the input is exhausted or the receiver is dropped.
pub fn spawn_reader<R>(reader: R) -> Receiver<MCResult<MeshEvent>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for event in JsonLines::new(reader) {
            if tx.send(event).is_err() {
                debug!("mesh event receiver dropped, stopping reader");
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use crate::lazy_init_tracing;

    #[test]
    fn test_decode_position_packet() {
        let ev = decode_line(
            r#"{"topic":"meshtastic.receive","from":439041101,"to":4294967295,
                "decoded":{"portnum":"POSITION_APP","position":{"latitude":45.123456,
                "longitude":-93.654321,"altitude":260,"batteryLevel":78,"time":1714566615}}}"#,
        )
        .unwrap();
        let MeshEvent::Packet(packet) = ev else {
            panic!("expected packet, got {ev:?}");
        };
        assert_eq!(packet.from, 0x1A2B3C4D);
        let pos = packet.decoded.unwrap().position.unwrap();
        assert_eq!(pos.lat(), Some(45.123456));
        assert_eq!(pos.lon(), Some(-93.654321));
        assert_eq!(pos.altitude, Some(260.0));
        assert_eq!(pos.battery_level, Some(78));
    }

    #[test]
    fn test_decode_scaled_coordinates() {
        let ev = decode_line(
            r#"{"topic":"meshtastic.receive","from":1,
                "decoded":{"position":{"latitudeI":451234560,"longitudeI":-936543210}}}"#,
        )
        .unwrap();
        let MeshEvent::Packet(packet) = ev else {
            panic!("expected packet");
        };
        let pos = packet.decoded.unwrap().position.unwrap();
        assert!((pos.lat().unwrap() - 45.123456).abs() < 1e-9);
        assert!((pos.lon().unwrap() + 93.654321).abs() < 1e-9);
    }

    #[test]
    fn test_decode_lifecycle() {
        assert_eq!(
            decode_line(r#"{"topic":"meshtastic.connection.established"}"#).unwrap(),
            MeshEvent::Connected
        );
        assert_eq!(
            decode_line(r#"{"topic":"meshtastic.connection.lost"}"#).unwrap(),
            MeshEvent::Disconnected
        );
        let ev = decode_line(
            r#"{"topic":"meshtastic.node","num":16,"user":{"longName":"Base","shortName":"B"}}"#,
        )
        .unwrap();
        let MeshEvent::Node(node) = ev else {
            panic!("expected node");
        };
        assert_eq!(node.num, 16);
        assert_eq!(node.user.unwrap().long_name, "Base");
    }

    #[test]
    fn test_decode_errors() {
        let cases = [
            "not json",
            r#"{"topic":"meshtastic.receive"}"#,
            r#"{"topic":"meshtastic.receive","from":-1}"#,
            r#"{"topic":"meshtastic.log.line","line":"x"}"#,
            r#"{"from":1}"#,
        ];
        for line in cases {
            assert!(
                matches!(decode_line(line), Err(Error::Decode(_))),
                "{line} should not decode"
            );
        }
    }

    #[test]
    fn test_json_lines_skips_bad_lines() {
        lazy_init_tracing();
        let input = concat!(
            "{\"topic\":\"meshtastic.connection.established\"}\n",
            "\n",
            "{garbage\n",
            "{\"topic\":\"meshtastic.receive\",\"from\":7}\n",
        );
        let events: Vec<_> = JsonLines::new(Cursor::new(input)).collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], Ok(MeshEvent::Connected)));
        assert!(events[1].is_err());
        assert!(matches!(&events[2], Ok(MeshEvent::Packet(p)) if p.from == 7 && p.decoded.is_none()));
    }

    #[test]
    fn test_spawn_reader_delivers_in_order() {
        let input = (1..=5)
            .map(|n| format!("{{\"topic\":\"meshtastic.receive\",\"from\":{n}}}\n"))
            .collect::<String>();
        let rx = spawn_reader(Cursor::new(input));
        let froms: Vec<u32> = rx
            .iter()
            .map(|ev| match ev {
                Ok(MeshEvent::Packet(p)) => p.from,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(froms, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_open_missing_input() {
        let res = open_input(Path::new("/nonexistent/mesh.jsonl"));
        assert!(matches!(res, Err(Error::Config(_))));
    }
}

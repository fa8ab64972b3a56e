/// Delivery of encoded CoT documents.
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use tracing::trace;

use crate::{Error, MCResult};

/// Destination for encoded events. One call, one datagram.
pub trait CotSink {
    fn send(&self, datagram: &[u8]) -> MCResult<()>;
}

/// Fire-and-forget UDP delivery. Every send opens its own socket and drops it afterwards, so
/// nothing is shared between packets.
#[derive(Debug, Clone)]
pub struct UdpSink {
    dest: SocketAddr,
    multicast_ttl: u32,
}

impl UdpSink {
    pub fn new(dest: SocketAddr, multicast_ttl: u32) -> Self {
        Self {
            dest,
            multicast_ttl,
        }
    }

    pub fn dest(&self) -> SocketAddr {
        self.dest
    }

    fn open(&self) -> MCResult<UdpSocket> {
        let socket = match self.dest {
            SocketAddr::V4(dest) => {
                let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
                if dest.ip().is_multicast() {
                    socket.set_multicast_ttl_v4(self.multicast_ttl)?;
                }
                socket
            }
            SocketAddr::V6(_) => UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0))?,
        };
        Ok(socket)
    }
}

impl CotSink for UdpSink {
    fn send(&self, datagram: &[u8]) -> MCResult<()> {
        let socket = self.open()?;
        let sent = socket.send_to(datagram, self.dest)?;
        trace!("sent {} bytes to {}", sent, self.dest);
        if sent != datagram.len() {
            return Err(Error::Transport(format!(
                "short write to {}: {sent} of {} bytes",
                self.dest,
                datagram.len()
            )));
        }
        Ok(())
    }
}

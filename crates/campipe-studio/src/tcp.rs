//! Frame export over TCP.
//!
//! Each message is a big-endian `u32` length counting the bytes that follow
//! it, a `u8` message type and the payload. A frame message (type 1) carries
//! `u32 width`, `u32 height` and the RGBA rows, top row first.

use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};

use campipe_engine::export::{FrameSink, OwnedFrame};

pub const MSG_FRAME: u8 = 1;

/// Writes one frame message into `out`, replacing its contents.
pub fn encode_frame(frame: &OwnedFrame, out: &mut Vec<u8>) -> io::Result<()> {
    let body = 1 + 8 + frame.data.len();
    let len = u32::try_from(body).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;

    out.clear();
    out.reserve(4 + body);
    out.extend_from_slice(&len.to_be_bytes());
    out.push(MSG_FRAME);
    out.extend_from_slice(&frame.width.to_be_bytes());
    out.extend_from_slice(&frame.height.to_be_bytes());
    out.extend_from_slice(&frame.data);
    Ok(())
}

pub struct TcpSink {
    stream: TcpStream,
    scratch: Vec<u8>,
}

impl TcpSink {
    pub fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        if let Ok(peer) = stream.peer_addr() {
            log::info!("exporting frames to {peer}");
        }
        Ok(Self { stream, scratch: Vec::new() })
    }
}

impl FrameSink for TcpSink {
    fn send(&mut self, frame: &OwnedFrame) -> io::Result<()> {
        encode_frame(frame, &mut self.scratch)?;
        self.stream.write_all(&self.scratch)
    }
}

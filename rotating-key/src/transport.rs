//! Newline-delimited JSON over a TCP stream.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

use serde::Serialize;

use crate::error::ChannelError;
use crate::msg::{ControlMsg, ErrorMsg, Frame};

/// Both halves of one connection; reads are buffered, writes are not.
#[derive(Debug)]
pub struct JsonLines {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl JsonLines {
    pub fn new(stream: TcpStream) -> Result<Self, ChannelError> {
        let writer = stream.try_clone()?;
        Ok(JsonLines {
            reader: BufReader::new(stream),
            writer,
        })
    }

    /// Serialize one value and terminate it with a newline.
    pub fn send(&mut self, value: &impl Serialize) -> Result<(), ChannelError> {
        let mut line = serde_json::to_string(value)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    /// Read one frame; a clean EOF maps to [`ChannelError::PeerClosed`].
    pub fn recv(&mut self) -> Result<Frame, ChannelError> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            return Err(ChannelError::PeerClosed);
        }
        Ok(serde_json::from_str(line.trim_end())?)
    }

    /// Read one frame and require a protocol message, surfacing a remote
    /// `{"error": ...}` as [`ChannelError::Remote`].
    pub fn recv_msg(&mut self) -> Result<ControlMsg, ChannelError> {
        match self.recv()? {
            Frame::Msg(msg) => Ok(msg),
            Frame::Error(ErrorMsg { error }) => Err(ChannelError::Remote(error)),
        }
    }
}

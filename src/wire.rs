//! Line-oriented wire codec.
//!
//! Every message is one newline-terminated ASCII line of the form
//! `TAG:value`. Values never contain embedded newlines. Within one
//! protocol step the receiver reads a fixed count of lines and
//! dispatches each by tag, so the fields of a step may arrive in any
//! order.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;

use log::trace;

use crate::errors::{Error, ErrorKind, Result, ResultExt};
use error_chain::{bail, ensure};

/// The field tags defined by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Sender identity.
    Id,
    /// Prime modulus, decimal.
    P,
    /// Generator, decimal.
    G,
    /// Public value, decimal.
    Pub,
    /// Authentication tag, hex.
    Mac,
    /// Confirmation tag, hex.
    Confirm,
    /// Encrypted demo payload, hex.
    Enc,
}

impl Tag {
    /// The wire spelling of this tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Id => "ID",
            Tag::P => "P",
            Tag::G => "G",
            Tag::Pub => "PUB",
            Tag::Mac => "MAC",
            Tag::Confirm => "CONFIRM",
            Tag::Enc => "ENC",
        }
    }

    /// Parses a wire spelling back into a tag.
    pub fn from_wire(s: &str) -> Option<Tag> {
        match s {
            "ID" => Some(Tag::Id),
            "P" => Some(Tag::P),
            "G" => Some(Tag::G),
            "PUB" => Some(Tag::Pub),
            "MAC" => Some(Tag::Mac),
            "CONFIRM" => Some(Tag::Confirm),
            "ENC" => Some(Tag::Enc),
            _ => None,
        }
    }
}

impl ::std::fmt::Display for Tag {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hex-encodes a byte string for wire transport.
pub fn hex_encode(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decodes a hex wire value. Odd-length or non-hex input is a
/// validation error, never a silent truncation.
pub fn hex_decode(s: &str) -> Result<Vec<u8>> {
    hex::decode(s)
        .chain_err(|| ErrorKind::Validation(format!("invalid hex value {:?}", s)))
}

/// Tagged-line framing over a buffered reader and a writer.
///
/// The reader and writer halves usually wrap the same duplex stream
/// (see [`Wire::from_tcp`]); keeping them generic lets tests drive the
/// codec with in-memory buffers.
pub struct Wire<R, W> {
    reader: R,
    writer: W,
}

impl Wire<BufReader<TcpStream>, TcpStream> {
    /// Wraps a TCP stream, buffering reads over a cloned handle.
    pub fn from_tcp(stream: TcpStream) -> Result<Wire<BufReader<TcpStream>, TcpStream>> {
        let read_half = stream
            .try_clone()
            .chain_err(|| ErrorKind::Transport("clone stream handle".into()))?;
        Ok(Wire::new(BufReader::new(read_half), stream))
    }
}

impl<R: BufRead, W: Write> Wire<R, W> {
    /// Builds a wire from explicit reader and writer halves.
    pub fn new(reader: R, writer: W) -> Wire<R, W> {
        Wire { reader, writer }
    }

    /// Sends one `TAG:value` line.
    pub fn send(&mut self, tag: Tag, value: &str) -> Result<()> {
        ensure!(
            !value.contains('\n') && !value.contains('\r'),
            ErrorKind::Protocol(format!("{} value contains a line break", tag))
        );
        trace!("send {}:{}", tag, value);
        writeln!(self.writer, "{}:{}", tag, value)
            .and_then(|_| self.writer.flush())
            .map_err(|e| transport_err(e, &format!("send {} line", tag)))
    }

    /// Receives one line and splits it into tag and value.
    pub fn recv(&mut self) -> Result<(Tag, String)> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .map_err(|e| transport_err(e, "read line from peer"))?;
        if n == 0 {
            bail!(ErrorKind::Transport("connection closed by peer".into()));
        }
        let line = line.trim_end_matches('\n').trim_end_matches('\r');
        let (tag, value) = line
            .split_once(':')
            .ok_or_else(|| ErrorKind::Protocol(format!("malformed line {:?}", line)))?;
        let tag = Tag::from_wire(tag)
            .ok_or_else(|| ErrorKind::Protocol(format!("unknown tag {:?}", tag)))?;
        trace!("recv {}:{}", tag, value);
        Ok((tag, value.to_owned()))
    }

    /// Reads exactly `expected.len()` lines and dispatches them by tag.
    ///
    /// Each expected tag must appear exactly once; a duplicate or a tag
    /// outside the step's set is a protocol error. Arrival order within
    /// the step does not matter.
    pub fn recv_step(&mut self, expected: &[Tag]) -> Result<HashMap<Tag, String>> {
        let mut fields = HashMap::with_capacity(expected.len());
        for _ in 0..expected.len() {
            let (tag, value) = self.recv()?;
            ensure!(
                expected.contains(&tag),
                ErrorKind::Protocol(format!("unexpected {} field in this step", tag))
            );
            ensure!(
                fields.insert(tag, value).is_none(),
                ErrorKind::Protocol(format!("duplicate {} field", tag))
            );
        }
        Ok(fields)
    }
}

// Maps deadline expiry distinctly from other stream failures.
fn transport_err(e: io::Error, what: &str) -> Error {
    let reason = if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut {
        format!("{}: step deadline exceeded", what)
    } else {
        what.to_owned()
    };
    Error::with_chain(e, ErrorKind::Transport(reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn wire_over(input: &str) -> Wire<Cursor<Vec<u8>>, Vec<u8>> {
        Wire::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn send_then_recv_round_trip() {
        let mut tx = Wire::new(Cursor::new(Vec::new()), Vec::new());
        tx.send(Tag::Id, "alice").unwrap();
        tx.send(Tag::P, "23").unwrap();
        let written = String::from_utf8(tx.writer).unwrap();
        assert_eq!(written, "ID:alice\nP:23\n");

        let mut rx = wire_over(&written);
        assert_eq!(rx.recv().unwrap(), (Tag::Id, "alice".to_owned()));
        assert_eq!(rx.recv().unwrap(), (Tag::P, "23".to_owned()));
    }

    #[test]
    fn send_rejects_embedded_newline() {
        let mut tx = Wire::new(Cursor::new(Vec::new()), Vec::new());
        assert!(tx.send(Tag::Id, "al\nice").is_err());
    }

    #[test]
    fn recv_step_tolerates_any_field_order() {
        let mut rx = wire_over("MAC:00ff\nID:bob\nCONFIRM:ab\nPUB:8\n");
        let step = rx
            .recv_step(&[Tag::Pub, Tag::Mac, Tag::Id, Tag::Confirm])
            .unwrap();
        assert_eq!(step[&Tag::Id], "bob");
        assert_eq!(step[&Tag::Pub], "8");
        assert_eq!(step[&Tag::Mac], "00ff");
        assert_eq!(step[&Tag::Confirm], "ab");
    }

    #[test]
    fn recv_step_rejects_duplicates_and_strays() {
        let mut rx = wire_over("ID:bob\nID:bob\n");
        let err = rx.recv_step(&[Tag::Id, Tag::Pub]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(_)));

        let mut rx = wire_over("ENC:00\n");
        let err = rx.recv_step(&[Tag::Id]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(_)));
    }

    #[test]
    fn recv_classifies_framing_failures() {
        let mut rx = wire_over("");
        assert!(matches!(
            rx.recv().unwrap_err().kind(),
            ErrorKind::Transport(_)
        ));

        let mut rx = wire_over("no separator here\n");
        assert!(matches!(
            rx.recv().unwrap_err().kind(),
            ErrorKind::Protocol(_)
        ));

        let mut rx = wire_over("NOPE:1\n");
        assert!(matches!(
            rx.recv().unwrap_err().kind(),
            ErrorKind::Protocol(_)
        ));
    }

    #[test]
    fn hex_round_trip_and_strictness() {
        let data = b"\x00\x01\xfe\xff";
        assert_eq!(hex_decode(&hex_encode(data)).unwrap(), data);

        // Odd length fails outright instead of truncating.
        let err = hex_decode("abc").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Validation(_)));
        assert!(matches!(
            hex_decode("zz").unwrap_err().kind(),
            ErrorKind::Validation(_)
        ));
    }
}

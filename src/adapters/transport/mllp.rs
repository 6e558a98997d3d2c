//! MLLP framing and TCP transport
//!
//! An MLLP frame is `0x0B <message> 0x1C 0x0D`. Raw framing sends the bare
//! message and delimits it by closing the write half of the connection, so
//! a raw connection carries one message and one reply.

use super::Transport;
use crate::domain::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use url::Url;

/// Start of an MLLP block
pub const START_BLOCK: u8 = 0x0B;
/// End of an MLLP block
pub const END_BLOCK: u8 = 0x1C;
/// Trailer after the end block
pub const CARRIAGE_RETURN: u8 = 0x0D;

/// Largest frame accepted before the peer is considered broken
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

const READ_CHUNK: usize = 8 * 1024;

/// Byte-level envelope around a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    #[default]
    Mllp,
    Raw,
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::Mllp => write!(f, "mllp"),
            Framing::Raw => write!(f, "raw"),
        }
    }
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mllp" => Ok(Framing::Mllp),
            "raw" => Ok(Framing::Raw),
            _ => Err(format!("Invalid framing '{s}'. Must be one of: mllp, raw")),
        }
    }
}

/// Encodes and extracts frames
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    framing: Framing,
    max_frame_bytes: usize,
}

impl FrameCodec {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Wraps a message for the wire
    pub fn encode(&self, message: &str) -> Vec<u8> {
        match self.framing {
            Framing::Mllp => {
                let mut out = Vec::with_capacity(message.len() + 3);
                out.push(START_BLOCK);
                out.extend_from_slice(message.as_bytes());
                out.push(END_BLOCK);
                out.push(CARRIAGE_RETURN);
                out
            }
            Framing::Raw => message.as_bytes().to_vec(),
        }
    }

    /// Removes the first complete frame from `buf`
    ///
    /// Returns `Ok(None)` while the frame is incomplete. Line breaks between
    /// frames are skipped. Raw frames are only complete at end of stream, see
    /// [`FrameCodec::decode_eof`].
    pub fn decode(&self, buf: &mut Vec<u8>) -> Result<Option<String>, TransportError> {
        if self.framing == Framing::Raw {
            return self.check_size(buf).map(|_| None);
        }

        let skip = buf
            .iter()
            .take_while(|b| matches!(b, b'\r' | b'\n'))
            .count();
        buf.drain(..skip);

        let Some(&first) = buf.first() else {
            return Ok(None);
        };
        if first != START_BLOCK {
            return Err(TransportError::Framing(format!(
                "expected start block 0x0B, got 0x{first:02X}"
            )));
        }

        let Some(end) = buf.iter().position(|&b| b == END_BLOCK) else {
            self.check_size(buf)?;
            return Ok(None);
        };
        match buf.get(end + 1) {
            None => Ok(None),
            Some(&CARRIAGE_RETURN) => {
                let frame: Vec<u8> = buf.drain(..end + 2).collect();
                utf8_payload(&frame[1..end]).map(Some)
            }
            Some(&other) => Err(TransportError::Framing(format!(
                "expected 0x0D after end block, got 0x{other:02X}"
            ))),
        }
    }

    /// Handles end of stream with `buf` holding unconsumed bytes
    pub fn decode_eof(&self, buf: &mut Vec<u8>) -> Result<Option<String>, TransportError> {
        if buf.iter().all(|b| b.is_ascii_whitespace()) {
            buf.clear();
            return Ok(None);
        }
        match self.framing {
            Framing::Raw => {
                let frame = std::mem::take(buf);
                utf8_payload(&frame).map(Some)
            }
            Framing::Mllp => Err(TransportError::Framing(
                "connection closed inside a frame".to_string(),
            )),
        }
    }

    fn check_size(&self, buf: &[u8]) -> Result<(), TransportError> {
        if buf.len() > self.max_frame_bytes {
            return Err(TransportError::Framing(format!(
                "frame exceeds {} bytes",
                self.max_frame_bytes
            )));
        }
        Ok(())
    }
}

/// Reads the next frame, `Ok(None)` on a clean end of stream
pub async fn read_frame<R>(
    reader: &mut R,
    codec: &FrameCodec,
    buf: &mut Vec<u8>,
) -> Result<Option<String>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        if let Some(frame) = codec.decode(buf)? {
            return Ok(Some(frame));
        }
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            return codec.decode_eof(buf);
        }
        buf.extend_from_slice(&chunk[..read]);
    }
}

/// Payload text; bytes that are not UTF-8 fail the frame instead of being replaced
fn utf8_payload(bytes: &[u8]) -> Result<String, TransportError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| TransportError::Framing(format!("frame is not valid UTF-8: {e}")))
}

/// `host:port` from `tcp://host:port`, `mllp://host:port` or a bare `host:port`
pub fn tcp_address(endpoint: &str) -> Result<String, TransportError> {
    let with_scheme = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("tcp://{endpoint}")
    };
    let url = Url::parse(&with_scheme)
        .map_err(|e| TransportError::InvalidEndpoint(format!("{endpoint}: {e}")))?;

    if !matches!(url.scheme(), "tcp" | "mllp") {
        return Err(TransportError::InvalidEndpoint(format!(
            "{endpoint}: scheme must be tcp or mllp"
        )));
    }
    // Host's Display keeps the brackets around IPv6 literals
    let host = url
        .host()
        .map(|host| host.to_string())
        .ok_or_else(|| TransportError::InvalidEndpoint(format!("{endpoint}: missing host")))?;
    let port = url
        .port()
        .ok_or_else(|| TransportError::InvalidEndpoint(format!("{endpoint}: missing port")))?;
    Ok(format!("{host}:{port}"))
}

/// Sends messages over TCP, one connection per message
#[derive(Debug, Clone)]
pub struct MllpTransport {
    codec: FrameCodec,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl MllpTransport {
    pub fn new(framing: Framing, timeout: Duration) -> Self {
        Self {
            codec: FrameCodec::new(framing),
            connect_timeout: timeout,
            response_timeout: timeout,
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }
}

#[async_trait]
impl Transport for MllpTransport {
    async fn send(&self, message: &str, endpoint: &str) -> Result<Option<String>, TransportError> {
        let address = tcp_address(endpoint)?;

        let mut stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| TransportError::Timeout(format!("connecting to {address}")))?
            .map_err(|e| TransportError::Connect {
                endpoint: address.clone(),
                message: e.to_string(),
            })?;

        stream.write_all(&self.codec.encode(message)).await?;
        stream.flush().await?;
        if self.codec.framing() == Framing::Raw {
            stream.shutdown().await?;
        }

        let mut buf = Vec::new();
        tokio::time::timeout(
            self.response_timeout,
            read_frame(&mut stream, &self.codec, &mut buf),
        )
        .await
        .map_err(|_| TransportError::Timeout(format!("waiting for reply from {address}")))?
    }

    fn name(&self) -> &'static str {
        match self.codec.framing() {
            Framing::Mllp => "mllp",
            Framing::Raw => "tcp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_encode_wraps_message() {
        let bytes = FrameCodec::new(Framing::Mllp).encode("MSH|^~\\&\r");
        assert_eq!(bytes.first(), Some(&START_BLOCK));
        assert_eq!(&bytes[bytes.len() - 2..], &[END_BLOCK, CARRIAGE_RETURN]);
        assert_eq!(FrameCodec::new(Framing::Raw).encode("MSH"), b"MSH".to_vec());
    }

    #[test]
    fn test_decode_waits_for_complete_frame() {
        let codec = FrameCodec::new(Framing::Mllp);
        let mut buf = vec![START_BLOCK];
        buf.extend_from_slice(b"MSH|^~\\&|A\r");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.push(END_BLOCK);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.push(CARRIAGE_RETURN);
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("MSH|^~\\&|A\r")
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let codec = FrameCodec::new(Framing::Mllp);
        let mut buf = vec![START_BLOCK];
        buf.extend_from_slice(b"MSH|^~\\&|\xFF\xFE\r");
        buf.extend_from_slice(&[END_BLOCK, CARRIAGE_RETURN]);
        assert!(matches!(codec.decode(&mut buf), Err(TransportError::Framing(_))));

        let raw = FrameCodec::new(Framing::Raw);
        let mut buf = b"MSH|\xC3\x28".to_vec();
        assert!(matches!(raw.decode_eof(&mut buf), Err(TransportError::Framing(_))));
    }

    #[test]
    fn test_decode_back_to_back_frames() {
        let codec = FrameCodec::new(Framing::Mllp);
        let mut buf = codec.encode("ONE");
        buf.extend_from_slice(b"\r\n");
        buf.extend(codec.encode("TWO"));

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("ONE"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("TWO"));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test_case(b"MSH|no start block" ; "missing start block")]
    #[test_case(&[START_BLOCK, b'A', END_BLOCK, b'X'] ; "bad trailer")]
    fn test_decode_rejects_bad_frames(input: &[u8]) {
        let mut buf = input.to_vec();
        assert!(matches!(
            FrameCodec::new(Framing::Mllp).decode(&mut buf),
            Err(TransportError::Framing(_))
        ));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let codec = FrameCodec::new(Framing::Mllp).with_max_frame_bytes(8);
        let mut buf = vec![START_BLOCK];
        buf.extend_from_slice(&[b'A'; 16]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn test_decode_eof() {
        let mllp = FrameCodec::new(Framing::Mllp);
        assert_eq!(mllp.decode_eof(&mut b"\r\n".to_vec()).unwrap(), None);
        assert!(mllp.decode_eof(&mut vec![START_BLOCK, b'A']).is_err());

        let raw = FrameCodec::new(Framing::Raw);
        assert_eq!(
            raw.decode_eof(&mut b"MSH|^~\\&\r".to_vec()).unwrap().as_deref(),
            Some("MSH|^~\\&\r")
        );
    }

    #[test_case("tcp://lab.example.org:2575", "lab.example.org:2575")]
    #[test_case("mllp://10.0.0.5:6661", "10.0.0.5:6661")]
    #[test_case("localhost:2575", "localhost:2575")]
    #[test_case("tcp://[::1]:2575", "[::1]:2575" ; "ipv6 with scheme")]
    #[test_case("[fe80::1]:6661", "[fe80::1]:6661" ; "bare ipv6")]
    fn test_tcp_address(endpoint: &str, expected: &str) {
        assert_eq!(tcp_address(endpoint).unwrap(), expected);
    }

    #[test_case("tcp://lab.example.org" ; "missing port")]
    #[test_case("https://lab.example.org:443" ; "http scheme")]
    fn test_tcp_address_invalid(endpoint: &str) {
        assert!(matches!(
            tcp_address(endpoint),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_framing_from_str() {
        assert_eq!("MLLP".parse::<Framing>().unwrap(), Framing::Mllp);
        assert_eq!("raw".parse::<Framing>().unwrap(), Framing::Raw);
        assert!("soap".parse::<Framing>().is_err());
    }

    #[tokio::test]
    async fn test_read_frame_from_stream() {
        let codec = FrameCodec::new(Framing::Mllp);
        let bytes = codec.encode("MSH|^~\\&|A\r");
        let mut reader: &[u8] = &bytes;
        let mut buf = Vec::new();

        let frame = read_frame(&mut reader, &codec, &mut buf).await.unwrap();
        assert_eq!(frame.as_deref(), Some("MSH|^~\\&|A\r"));
        assert_eq!(read_frame(&mut reader, &codec, &mut buf).await.unwrap(), None);
    }
}

//! Content-Length framed socket transport.
//! - Endpoint: tcp:// and unix:// addresses
//! - read_message/write_message: header + payload framing
//! - StreamTransport: writer thread fed by a channel
//! - StreamSource: blocking frame reader

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
#[cfg(unix)]
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::TransportError;
use crate::transport::{FrameSource, Transport};

const CONTENT_LENGTH: &str = "Content-Length";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(SocketAddr),
    #[cfg(unix)]
    Unix(PathBuf),
}

impl Endpoint {
    pub fn parse(text: &str) -> Result<Self, TransportError> {
        if let Some(rest) = text.strip_prefix("tcp://") {
            let addr = rest
                .parse::<SocketAddr>()
                .map_err(|_| TransportError::Endpoint(text.into()))?;
            return Ok(Self::Tcp(addr));
        }
        #[cfg(unix)]
        if let Some(rest) = text.strip_prefix("unix://") {
            return Ok(Self::Unix(PathBuf::from(rest)));
        }
        Err(TransportError::Endpoint(text.into()))
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            #[cfg(unix)]
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Largest payload a peer may announce in its `Content-Length` header.
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Reads one framed payload; `None` when the stream ends between frames.
pub fn read_message<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let Some(length) = read_header_block(reader)? else {
        return Ok(None);
    };
    if length > MAX_FRAME_BYTES {
        return Err(invalid_data(format!(
            "frame of {length} bytes exceeds the {MAX_FRAME_BYTES} byte limit"
        )));
    }
    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload)?;
    String::from_utf8(payload)
        .map(Some)
        .map_err(|_| invalid_data("frame payload is not utf-8"))
}

/// Consumes header lines up to the blank separator and returns the announced length.
fn read_header_block<R: BufRead>(reader: &mut R) -> io::Result<Option<usize>> {
    let mut length = None;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            return length
                .map(Some)
                .ok_or_else(|| invalid_data(format!("missing {CONTENT_LENGTH} header")));
        }
        let Some((name, value)) = header.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
            let value = value.trim();
            let parsed = value
                .parse::<usize>()
                .map_err(|_| invalid_data(format!("invalid {CONTENT_LENGTH} '{value}'")))?;
            length = Some(parsed);
        }
    }
}

fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

pub fn write_message<W: Write>(writer: &mut W, payload: &str) -> io::Result<()> {
    write!(writer, "{CONTENT_LENGTH}: {}\r\n\r\n{payload}", payload.len())?;
    writer.flush()
}

#[derive(Debug)]
enum Socket {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Socket {
    fn connect(endpoint: &Endpoint) -> io::Result<Self> {
        Ok(match endpoint {
            Endpoint::Tcp(addr) => Self::Tcp(TcpStream::connect(addr)?),
            #[cfg(unix)]
            Endpoint::Unix(path) => Self::Unix(std::os::unix::net::UnixStream::connect(path)?),
        })
    }

    fn try_clone(&self) -> io::Result<Self> {
        Ok(match self {
            Self::Tcp(stream) => Self::Tcp(stream.try_clone()?),
            #[cfg(unix)]
            Self::Unix(stream) => Self::Unix(stream.try_clone()?),
        })
    }

    fn shutdown(&self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Self::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }
}

impl Read for Socket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Socket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// Connects to `endpoint` and splits the socket into both transport halves.
pub fn connect(
    endpoint: &Endpoint,
) -> Result<(StreamTransport, StreamSource<impl Read + Send>), TransportError> {
    let socket = Socket::connect(endpoint)?;
    let reader = socket.try_clone()?;
    let control = socket.try_clone()?;
    debug!(%endpoint, "connected");
    let mut transport = StreamTransport::spawn(socket);
    transport.socket = Some(control);
    Ok((transport, StreamSource::new(reader)))
}

/// Writes frames from a dedicated thread so senders never wait on the socket.
#[derive(Debug)]
pub struct StreamTransport {
    outgoing: Mutex<Option<Sender<String>>>,
    socket: Option<Socket>,
}

impl StreamTransport {
    pub fn spawn<W: Write + Send + 'static>(mut writer: W) -> Self {
        let (sender, receiver) = unbounded::<String>();
        thread::spawn(move || {
            while let Ok(payload) = receiver.recv() {
                if let Err(err) = write_message(&mut writer, &payload) {
                    error!(%err, "failed to write frame");
                    break;
                }
            }
        });
        Self {
            outgoing: Mutex::new(Some(sender)),
            socket: None,
        }
    }
}

impl Transport for StreamTransport {
    fn send_frame(&self, frame: String) -> Result<(), TransportError> {
        let outgoing = self.outgoing.lock();
        let sender = outgoing.as_ref().ok_or(TransportError::Closed)?;
        sender.send(frame).map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        self.outgoing.lock().take();
        if let Some(socket) = &self.socket {
            if let Err(err) = socket.shutdown() {
                debug!(%err, "socket shutdown failed");
            }
        }
    }
}

pub struct StreamSource<R> {
    reader: BufReader<R>,
}

impl<R: Read> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }
}

impl<R: Read + Send> FrameSource for StreamSource<R> {
    fn next_frame(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let Some(payload) = read_message(&mut self.reader)? else {
                return Ok(None);
            };
            // handshake and keep-alive frames carry headers only
            if !payload.trim().is_empty() {
                return Ok(Some(payload));
            }
        }
    }
}

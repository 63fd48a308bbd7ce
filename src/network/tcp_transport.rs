//! TCP transport: one long-lived stream per peer, frames prefixed by a u32 big-endian length.

use crate::error::{BlockchainError, Result};
use crate::network::transport::{Rpc, Transport, TransportEvent};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::io::{BufReader, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

const TCP_WRITE_TIMEOUT: u64 = 5000;
const TCP_CONNECT_TIMEOUT: u64 = 5000;
pub const MAX_FRAME_LEN: usize = 32 * 1024 * 1024;

type Connections = HashMap<String, Arc<Mutex<TcpStream>>>;

pub struct TcpTransport {
    listen_addr: String,
    conns: RwLock<Connections>,
    tx: Sender<TransportEvent>,
    rx: Mutex<Option<Receiver<TransportEvent>>>,
}

impl TcpTransport {
    /// Binds the listener and starts accepting peers in the background.
    pub fn bind(addr: &str) -> Result<Arc<TcpTransport>> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| BlockchainError::Network(format!("Failed to bind to {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| BlockchainError::Network(format!("Failed to read local address: {e}")))?;
        info!("Server listening on {local_addr}");

        let (tx, rx) = channel();
        let transport = Arc::new(TcpTransport {
            listen_addr: local_addr.to_string(),
            conns: RwLock::new(HashMap::new()),
            tx,
            rx: Mutex::new(Some(rx)),
        });

        let acceptor = Arc::clone(&transport);
        thread::spawn(move || acceptor.accept_loop(listener));

        Ok(transport)
    }

    /// Dials a peer; the stream is then used in both directions.
    pub fn connect(self: &Arc<Self>, addr: &str) -> Result<()> {
        let socket_addr = addr
            .parse::<SocketAddr>()
            .map_err(|e| BlockchainError::Network(format!("Invalid address {addr}: {e}")))?;

        let stream =
            TcpStream::connect_timeout(&socket_addr, Duration::from_millis(TCP_CONNECT_TIMEOUT))
                .map_err(|e| {
                    BlockchainError::Network(format!("Failed to connect to {addr}: {e}"))
                })?;

        self.register(stream)
    }

    fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(e) = self.register(stream) {
                        error!("Failed to register incoming connection: {e}");
                    }
                }
                Err(e) => {
                    error!("Error accepting connection: {e}");
                }
            }
        }
    }

    fn register(self: &Arc<Self>, stream: TcpStream) -> Result<()> {
        let peer_addr = stream
            .peer_addr()
            .map_err(|e| BlockchainError::Network(format!("Failed to get peer address: {e}")))?
            .to_string();

        stream
            .set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))
            .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;
        let reader = stream
            .try_clone()
            .map_err(|e| BlockchainError::Network(format!("Failed to clone stream: {e}")))?;

        self.conns
            .write()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?
            .insert(peer_addr.clone(), Arc::new(Mutex::new(stream)));

        let _ = self.tx.send(TransportEvent::Connected(peer_addr.clone()));

        let transport = Arc::clone(self);
        thread::spawn(move || transport.read_loop(reader, peer_addr));
        Ok(())
    }

    fn read_loop(&self, stream: TcpStream, peer_addr: String) {
        let mut reader = BufReader::new(&stream);
        loop {
            match read_frame(&mut reader) {
                Ok(payload) => {
                    let event = TransportEvent::Message(Rpc::new(peer_addr.clone(), payload));
                    if self.tx.send(event).is_err() {
                        break;
                    }
                }
                Err(BlockchainError::ConnectionClosed(_)) => {
                    debug!("Peer {peer_addr} closed the connection");
                    break;
                }
                Err(e) => {
                    warn!("Dropping connection to {peer_addr}: {e}");
                    break;
                }
            }
        }

        let _ = stream.shutdown(Shutdown::Both);
        if let Ok(mut conns) = self.conns.write() {
            conns.remove(&peer_addr);
        }
        info!("Disconnected from peer: {peer_addr}");
        let _ = self.tx.send(TransportEvent::Disconnected(peer_addr));
    }
}

impl Transport for TcpTransport {
    fn addr(&self) -> String {
        self.listen_addr.clone()
    }

    fn send_message(&self, to: &str, payload: Vec<u8>) -> Result<()> {
        let stream = self
            .conns
            .read()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))?
            .get(to)
            .cloned()
            .ok_or_else(|| BlockchainError::PeerNotFound(to.to_string()))?;

        let mut stream = stream
            .lock()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire stream lock: {e}")))?;
        write_frame(&mut *stream, &payload)
            .map_err(|e| BlockchainError::Network(format!("Failed to send data to {to}: {e}")))
    }

    fn consume(&self) -> Result<Receiver<TransportEvent>> {
        self.rx
            .lock()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire receiver lock: {e}")))?
            .take()
            .ok_or_else(|| {
                BlockchainError::Network(format!("{}: receiver already taken", self.listen_addr))
            })
    }
}

fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> std::io::Result<()> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            ErrorKind::InvalidInput,
            format!("frame of {} bytes exceeds limit", payload.len()),
        ));
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            return Err(BlockchainError::ConnectionClosed(e.to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(BlockchainError::Decode(format!(
            "Frame of {len} bytes exceeds limit"
        )));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

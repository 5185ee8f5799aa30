//! Protocol 3.3 client over TCP.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use log::{debug, warn};
use serde_json::{Map, Value, json};

use crate::crypto::{self, Key};
use crate::discovery::{LocalDeviceRecord, LocalScanner};
use crate::errors::Error;
use crate::runtime::{self, AsyncStream, BoxFuture, Mutex, TcpStream};

use super::frame::{Command, Frame, HEADER_LEN};
use super::{Datapoint, DatapointMap, LocalTransport, Result};

const SUPPORTED_VERSION: &str = "3.3";
const VERSION_HEADER_LEN: usize = 15;
/// Unsolicited status pushes tolerated before the awaited reply.
const MAX_SKIPPED_FRAMES: usize = 4;

/// A connection to one local bulb.
///
/// The bulb's address comes from discovery. When it is unknown, [`find`]
/// listens for the bulb's broadcast announcement.
///
/// [`find`]: LocalTransport::find
pub struct TuyaTransport {
    id: String,
    key: Key,
    port: u16,
    timeout: Duration,
    address: parking_lot::Mutex<Option<Ipv4Addr>>,
    scanner: LocalScanner,
    stream: Mutex<Option<TcpStream>>,
    connected: AtomicBool,
    seq: AtomicU32,
}

impl TuyaTransport {
    pub const PORT: u16 = 6668;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
    /// The only protocol version spoken.
    pub const VERSION: &'static str = SUPPORTED_VERSION;

    /// Create a transport for protocol version 3.3.
    pub fn new(id: &str, local_key: &str, address: Option<Ipv4Addr>) -> Result<Self> {
        Ok(TuyaTransport {
            id: id.to_string(),
            key: crypto::device_key(local_key)?,
            port: Self::PORT,
            timeout: Self::DEFAULT_TIMEOUT,
            address: parking_lot::Mutex::new(address),
            scanner: LocalScanner::new(),
            stream: Mutex::new(None),
            connected: AtomicBool::new(false),
            seq: AtomicU32::new(1),
        })
    }

    /// Create a transport for a discovered bulb.
    pub fn from_record(record: &LocalDeviceRecord, local_key: &str) -> Result<Self> {
        if record.version != SUPPORTED_VERSION {
            return Err(Error::Config(format!(
                "device {} speaks protocol {}, only {SUPPORTED_VERSION} is supported",
                record.id, record.version
            )));
        }
        Self::new(&record.id, local_key, Some(record.ip))
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Scanner used by `find` when the address is unknown.
    pub fn with_scanner(mut self, scanner: LocalScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn address(&self) -> Option<Ipv4Addr> {
        *self.address.lock()
    }

    fn request_body(&self, dps: Option<&DatapointMap>) -> Value {
        let t = chrono::Utc::now().timestamp().to_string();
        match dps {
            None => json!({"gwId": self.id, "devId": self.id, "uid": self.id, "t": t}),
            Some(values) => {
                let dps: Map<String, Value> = values
                    .iter()
                    .map(|(dp, value)| (dp.key(), value.clone()))
                    .collect();
                json!({"devId": self.id, "uid": self.id, "t": t, "dps": dps})
            }
        }
    }

    fn encode_payload(&self, command: Command, body: &Value) -> Result<Vec<u8>> {
        let plaintext = serde_json::to_vec(body).map_err(Error::JsonDump)?;
        let ciphertext = crypto::encrypt(&self.key, &plaintext);
        if command == Command::DpQuery {
            return Ok(ciphertext);
        }
        let mut payload = Vec::with_capacity(VERSION_HEADER_LEN + ciphertext.len());
        payload.extend_from_slice(SUPPORTED_VERSION.as_bytes());
        payload.extend_from_slice(&[0u8; VERSION_HEADER_LEN - 3]);
        payload.extend_from_slice(&ciphertext);
        Ok(payload)
    }

    /// Strip the return code and version header, then decrypt.
    fn decode_reply(&self, payload: &[u8]) -> Result<Option<Value>> {
        let mut body = payload;
        if body.len() >= 4 && body[..4] == [0, 0, 0, 0] {
            body = &body[4..];
        } else if body.len() >= 4 && body[0] == 0 {
            let code = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
            return Err(Error::transport("receive", format!("device returned code {code}")));
        }
        if body.starts_with(SUPPORTED_VERSION.as_bytes()) && body.len() >= VERSION_HEADER_LEN {
            body = &body[VERSION_HEADER_LEN..];
        }
        if body.is_empty() {
            return Ok(None);
        }

        let plaintext = crypto::decrypt(&self.key, body)?;
        let text = String::from_utf8(plaintext).map_err(Error::Utf8Decode)?;
        serde_json::from_str(&text).map(Some).map_err(Error::JsonLoad)
    }

    async fn read_frame(&self, stream: &mut TcpStream) -> Result<Frame> {
        let mut header = [0u8; HEADER_LEN];
        runtime::timeout(self.timeout, stream.read_exact(&mut header))
            .await
            .map_err(|e| Error::transport("receive", e))?
            .map_err(|e| Error::socket("receive", e))?;

        let (_, _, length) = Frame::parse_header(&header)?;
        let mut rest = vec![0u8; length];
        runtime::timeout(self.timeout, stream.read_exact(&mut rest))
            .await
            .map_err(|e| Error::transport("receive", e))?
            .map_err(|e| Error::socket("receive", e))?;

        Frame::decode(&header, &rest)
    }

    async fn exchange(&self, command: Command, body: Value) -> Result<Option<Value>> {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return Err(Error::transport("send", "not connected"));
        };

        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let frame = Frame::new(seq, command, self.encode_payload(command, &body)?);
        debug!("sending command {:?} seq {} to {}", command, seq, self.id);

        stream
            .write_all(&frame.encode())
            .await
            .map_err(|e| Error::socket("send", e))?;

        for _ in 0..=MAX_SKIPPED_FRAMES {
            let reply = self.read_frame(stream).await?;
            if reply.command == command as u32 {
                return self.decode_reply(&reply.payload);
            }
            debug!("skipping unsolicited frame {} from {}", reply.command, self.id);
        }

        Err(Error::transport("receive", "no reply to command"))
    }
}

impl LocalTransport for TuyaTransport {
    fn find(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.address().is_some() {
                return Ok(());
            }
            match self.scanner.find(&self.id).await? {
                Some(record) => {
                    debug!("found {} at {}", self.id, record.ip);
                    *self.address.lock() = Some(record.ip);
                    Ok(())
                }
                None => Err(Error::transport("find", format!("{} did not announce itself", self.id))),
            }
        })
    }

    fn connect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let ip = self
                .address()
                .ok_or_else(|| Error::transport("connect", "address unknown"))?;
            let addr = SocketAddr::from((ip, self.port));

            let stream = runtime::timeout(self.timeout, TcpStream::connect(addr))
                .await
                .map_err(|e| Error::transport("connect", e))?
                .map_err(|e| Error::socket("connect", e))?;

            *self.stream.lock().await = Some(stream);
            self.connected.store(true, Ordering::SeqCst);
            debug!("connected to {} at {}", self.id, addr);
            Ok(())
        })
    }

    fn disconnect(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.stream.lock().await.take().is_some() {
                debug!("disconnected from {}", self.id);
            }
            self.connected.store(false, Ordering::SeqCst);
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn get(&self, datapoint: Datapoint) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let status = self
                .exchange(Command::DpQuery, self.request_body(None))
                .await?
                .ok_or_else(|| Error::malformed("empty status reply"))?;

            status
                .get("dps")
                .and_then(|dps| dps.get(datapoint.key()))
                .cloned()
                .ok_or_else(|| {
                    warn!("{} did not report datapoint {}", self.id, datapoint.id());
                    Error::malformed(format!("datapoint {} missing from status", datapoint.id()))
                })
        })
    }

    fn set(&self, values: DatapointMap) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let body = self.request_body(Some(&values));
            self.exchange(Command::Control, body).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> TuyaTransport {
        TuyaTransport::new("eb5bcfaa30722046765rxa", "3c236d1941e65bde", Some(Ipv4Addr::LOCALHOST)).unwrap()
    }

    #[test]
    fn control_payload_carries_version_header() {
        let t = transport();
        let payload = t
            .encode_payload(Command::Control, &json!({"dps": {"20": true}}))
            .unwrap();
        assert!(payload.starts_with(b"3.3"));
        assert_eq!(&payload[3..VERSION_HEADER_LEN], &[0u8; 12]);
        assert_eq!((payload.len() - VERSION_HEADER_LEN) % 16, 0);
    }

    #[test]
    fn query_payload_is_bare_ciphertext() {
        let t = transport();
        let body = t.request_body(None);
        let payload = t.encode_payload(Command::DpQuery, &body).unwrap();
        let plain = crypto::decrypt(&t.key, &payload).unwrap();
        let value: Value = serde_json::from_slice(&plain).unwrap();
        assert_eq!(value["gwId"], "eb5bcfaa30722046765rxa");
    }

    #[test]
    fn control_body_keys_datapoints_by_id() {
        let t = transport();
        let values = DatapointMap::from([
            (Datapoint::Mode, json!("colour")),
            (Datapoint::Colour, json!("000003e803e8")),
        ]);
        let body = t.request_body(Some(&values));
        assert_eq!(body["dps"]["21"], "colour");
        assert_eq!(body["dps"]["24"], "000003e803e8");
        assert!(body.get("gwId").is_none());
    }

    #[test]
    fn decodes_versioned_reply_with_return_code() {
        let t = transport();
        let mut payload = vec![0, 0, 0, 0];
        payload.extend(t.encode_payload(Command::Control, &json!({"dps": {"20": false}})).unwrap());
        let value = t.decode_reply(&payload).unwrap().unwrap();
        assert_eq!(value["dps"]["20"], false);
    }

    #[test]
    fn empty_reply_is_an_acknowledgement() {
        assert_eq!(transport().decode_reply(&[0, 0, 0, 0]).unwrap(), None);
    }

    #[test]
    fn rejects_unsupported_protocol_versions() {
        let record = LocalDeviceRecord {
            id: "abc".into(),
            ip: Ipv4Addr::LOCALHOST,
            version: "3.4".into(),
            active: 2,
            ability: 0,
            encrypt: true,
            product_key: None,
            name: None,
        };
        assert!(matches!(
            TuyaTransport::from_record(&record, "3c236d1941e65bde"),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn operations_require_a_connection() {
        let t = transport();
        assert!(!t.is_connected());
        let err = t.get(Datapoint::Switch).await.unwrap_err();
        assert!(matches!(err, Error::TransportFailure { .. }));
    }
}

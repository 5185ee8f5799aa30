//! Passive discovery of local bulbs.
//!
//! Bulbs announce themselves by UDP broadcast every few seconds. Nothing is
//! sent: the scanner binds the announcement port, collects what arrives within
//! its window and returns the latest record per device id.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::errors::Error;
use crate::runtime::{self, AsyncUdpSocket, Instant, UdpSocket};
use crate::transport::frame::{PREFIX_55AA, PREFIX_6699, REPLY_OFFSET, TRAILER_LEN};

type Result<T> = std::result::Result<T, Error>;

/// Identity of a bulb as announced on the local network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDeviceRecord {
    #[serde(alias = "gwId")]
    pub id: String,
    pub ip: Ipv4Addr,
    /// Protocol version, e.g. `"3.3"`.
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub active: u32,
    /// Capability flags.
    #[serde(default)]
    pub ability: u32,
    #[serde(default)]
    pub encrypt: bool,
    #[serde(default)]
    pub product_key: Option<String>,
    /// Friendly name from configuration, never announced by the bulb.
    #[serde(default)]
    pub name: Option<String>,
}

fn default_version() -> String {
    "3.3".to_string()
}

/// Lifecycle of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Listening,
    Closed,
}

/// Listens for local bulb announcements.
///
/// # Examples
///
/// ```no_run
/// # async fn run() -> Result<(), lightdeck::Error> {
/// use std::time::Duration;
/// use lightdeck::LocalScanner;
///
/// let scanner = LocalScanner::new().with_window(Duration::from_secs(5));
/// for record in scanner.scan().await? {
///     println!("{} at {}", record.id, record.ip);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LocalScanner {
    port: u16,
    window: Duration,
    names: HashMap<String, String>,
    state: parking_lot::Mutex<ScanState>,
}

impl Default for LocalScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalScanner {
    pub const PORT: u16 = 6667;
    pub const WINDOW: Duration = Duration::from_secs(20);
    const RECV_TIMEOUT: Duration = Duration::from_millis(500);

    pub fn new() -> Self {
        LocalScanner {
            port: Self::PORT,
            window: Self::WINDOW,
            names: HashMap::new(),
            state: parking_lot::Mutex::new(ScanState::Idle),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Friendly names attached to records by device id.
    pub fn with_names(mut self, names: HashMap<String, String>) -> Self {
        self.names = names;
        self
    }

    pub fn state(&self) -> ScanState {
        *self.state.lock()
    }

    /// Collect every announcement heard within the window.
    pub async fn scan(&self) -> Result<Vec<LocalDeviceRecord>> {
        let found = self.listen(None).await?;
        Ok(found.into_values().collect())
    }

    /// Listen until `id` announces itself or the window elapses.
    pub async fn find(&self, id: &str) -> Result<Option<LocalDeviceRecord>> {
        let mut found = self.listen(Some(id)).await?;
        Ok(found.remove(id))
    }

    async fn listen(&self, target: Option<&str>) -> Result<HashMap<String, LocalDeviceRecord>> {
        let socket = UdpSocket::bind(&format!("0.0.0.0:{}", self.port))
            .await
            .map_err(|e| Error::socket("bind", e))?;
        socket
            .set_broadcast(true)
            .map_err(|e| Error::socket("set_broadcast", e))?;

        let bound = socket
            .local_addr()
            .map_err(|e| Error::socket("local_addr", e))?;

        *self.state.lock() = ScanState::Listening;
        info!("listening for announcements on {bound} for {:?}", self.window);

        let key = crypto::broadcast_key();
        let mut discovered: HashMap<String, LocalDeviceRecord> = HashMap::new();
        let start = Instant::now();
        let mut buffer = [0u8; 4096];

        while start.elapsed() < self.window {
            let wait = self.window.saturating_sub(start.elapsed()).min(Self::RECV_TIMEOUT);
            match runtime::timeout(wait, socket.recv_from(&mut buffer)).await {
                Ok(Ok((size, addr))) => match decode_announcement(&key, &buffer[..size]) {
                    Ok(Some(mut record)) => {
                        record.name = self.names.get(&record.id).cloned();
                        debug!("announcement from {} ({})", record.id, addr);
                        let id = record.id.clone();
                        discovered.insert(id.clone(), record);
                        if target == Some(id.as_str()) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => debug!("dropping datagram from {addr}: {e}"),
                },
                Ok(Err(e)) => warn!("receive failed: {e}"),
                Err(_) => continue,
            }
        }

        drop(socket);
        *self.state.lock() = ScanState::Closed;
        info!("scan closed with {} device(s)", discovered.len());
        Ok(discovered)
    }
}

/// Decode one broadcast datagram.
///
/// `Ok(None)` means the datagram was recognized but deliberately ignored.
pub(crate) fn decode_announcement(
    key: &crypto::Key,
    datagram: &[u8],
) -> Result<Option<LocalDeviceRecord>> {
    let ciphertext = if datagram.starts_with(&PREFIX_55AA) {
        if datagram.len() < REPLY_OFFSET + TRAILER_LEN {
            return Err(Error::malformed(format!("short frame of {} bytes", datagram.len())));
        }
        &datagram[REPLY_OFFSET..datagram.len() - TRAILER_LEN]
    } else if datagram.starts_with(&PREFIX_6699) {
        warn!("ignoring 6699 frame, protocol not supported");
        return Ok(None);
    } else {
        datagram
    };

    let plaintext = crypto::decrypt(key, ciphertext)?;
    let text = String::from_utf8(plaintext).map_err(Error::Utf8Decode)?;
    serde_json::from_str(&text).map(Some).map_err(Error::JsonLoad)
}

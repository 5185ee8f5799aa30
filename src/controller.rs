//! The control surface: id resolution and fan-out.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join_all};
use log::{debug, error, info, warn};
use parking_lot::RwLock;

use crate::bridge::{Alert, Effect};
use crate::config::ControllerConfig;
use crate::device::{BridgeDevice, Device, DeviceSummary, LocalDevice};
use crate::discovery::{BridgeScanner, DeviceRecord, LocalDeviceRecord};
use crate::errors::Error;
use crate::scene::Scene;
use crate::status::{Completed, LightState, ModeChange};
use crate::transport::TuyaTransport;
use crate::types::{Hsv, Mode, Percentage, Rgb};
use crate::warmth::WarmthTable;

type Result<T> = std::result::Result<T, Error>;

/// Devices by id, with the identity records the last scan produced for them.
#[derive(Default)]
struct Registry {
    devices: HashMap<String, Arc<Device>>,
    records: Vec<DeviceRecord>,
}

/// Owns the device registry and routes operations to devices by id.
///
/// The registry is an immutable snapshot. A rescan builds a new one and swaps
/// it in whole, devices and identity records together, so requests in flight
/// keep the devices they resolved.
///
/// Operations on several ids admit all of them or none: if any id is unknown
/// nothing is sent to the others.
pub struct LightController {
    config: ControllerConfig,
    warmth: Arc<WarmthTable>,
    registry: RwLock<Arc<Registry>>,
}

impl LightController {
    pub fn new(config: ControllerConfig, warmth: WarmthTable) -> Self {
        LightController {
            config,
            warmth: Arc::new(warmth),
            registry: RwLock::new(Arc::new(Registry::default())),
        }
    }

    /// Build a controller from configuration, loading its warmth table.
    pub fn from_config(config: ControllerConfig) -> Result<Self> {
        let warmth = config.warmth()?;
        Ok(Self::new(config, warmth))
    }

    /// A controller over a fixed set of devices.
    pub fn with_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let controller = Self::new(ControllerConfig::default(), WarmthTable::default());
        controller.swap(devices.into_iter().collect(), Vec::new());
        controller
    }

    /// The shared calibration handed to bridge devices.
    pub fn warmth(&self) -> Arc<WarmthTable> {
        Arc::clone(&self.warmth)
    }

    fn snapshot(&self) -> Arc<Registry> {
        Arc::clone(&self.registry.read())
    }

    fn swap(&self, devices: Vec<Device>, mut records: Vec<DeviceRecord>) {
        let mut registry = HashMap::with_capacity(devices.len());
        for device in devices {
            let id = device.id().to_string();
            if registry.insert(id.clone(), Arc::new(device)).is_some() {
                warn!("duplicate device id {id}, keeping the last one");
            }
        }
        records.sort_by(|a, b| a.id().cmp(b.id()));
        *self.registry.write() = Arc::new(Registry {
            devices: registry,
            records,
        });
    }

    /// Run both scanners and replace the registry with what they found.
    ///
    /// Returns the identity record of every registered device. A scanner that
    /// fails is logged and contributes nothing. If every scanner fails, the
    /// registry is left untouched and the error returned.
    pub async fn rescan(&self) -> Result<Vec<DeviceRecord>> {
        let (local, bridge) = futures::join!(self.scan_local(), self.scan_bridge());

        let mut found = Vec::new();
        let mut failure = None;
        for outcome in [local, bridge] {
            match outcome {
                Ok(pairs) => found.extend(pairs),
                Err(e) => {
                    error!("scan failed: {e}");
                    failure = Some(e);
                }
            }
        }
        if found.is_empty()
            && let Some(e) = failure
        {
            return Err(e);
        }

        info!("registry now holds {} device(s)", found.len());
        let (devices, records) = found.into_iter().unzip();
        self.swap(devices, records);
        Ok(self.list_records())
    }

    async fn scan_local(&self) -> Result<Vec<(Device, DeviceRecord)>> {
        if self.config.devices.is_empty() {
            return Ok(Vec::new());
        }
        let mut announced: HashMap<String, LocalDeviceRecord> = self
            .config
            .local_scanner()
            .scan()
            .await?
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        let mut found: Vec<(Device, DeviceRecord)> = Vec::new();
        for (id, device) in &self.config.devices {
            let record = match (announced.remove(id), device.ip) {
                (Some(record), _) => record,
                (None, Some(ip)) => LocalDeviceRecord {
                    id: id.clone(),
                    ip,
                    version: device.version.clone(),
                    active: 0,
                    ability: 0,
                    encrypt: true,
                    product_key: None,
                    name: device.name.clone(),
                },
                (None, None) => {
                    debug!("{id} did not announce itself");
                    continue;
                }
            };
            match TuyaTransport::from_record(&record, &device.key) {
                Ok(transport) => {
                    let transport = transport.with_scanner(self.config.local_scanner());
                    let local = LocalDevice::new(id, device.name.as_deref(), transport);
                    found.push((local.into(), record.into()));
                }
                Err(e) => warn!("skipping {id}: {e}"),
            }
        }

        for id in announced.keys() {
            debug!("ignoring {id}, no local key configured");
        }
        Ok(found)
    }

    async fn scan_bridge(&self) -> Result<Vec<(Device, DeviceRecord)>> {
        let Some(client) = self.config.bridge_client()? else {
            return Ok(Vec::new());
        };
        let transition = self
            .config
            .bridge
            .as_ref()
            .and_then(|bridge| bridge.transition_ms)
            .map(Duration::from_millis);

        let records = BridgeScanner::new(client.clone()).scan().await?;
        Ok(records
            .into_iter()
            .map(|record| {
                let device = BridgeDevice::new(
                    &record.id,
                    Some(&record.name),
                    record.index,
                    client.clone(),
                    self.warmth(),
                );
                let device = match transition {
                    Some(transition) => device.with_transition(transition),
                    None => device,
                };
                (Device::from(device), DeviceRecord::from(record))
            })
            .collect())
    }

    /// Every registered device, ordered by id.
    pub fn list_devices(&self) -> Vec<DeviceSummary> {
        let mut devices: Vec<_> = self
            .snapshot()
            .devices
            .values()
            .map(|d| d.summary())
            .collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    /// Identity records of the registered devices, as the last scan saw them.
    ///
    /// Devices registered through [`with_devices`](Self::with_devices) have
    /// no record.
    pub fn list_records(&self) -> Vec<DeviceRecord> {
        self.snapshot().records.clone()
    }

    pub fn device(&self, id: &str) -> Result<Arc<Device>> {
        self.snapshot()
            .devices
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Resolve every id before anything is sent.
    fn resolve(&self, ids: &[&str]) -> Result<Vec<Arc<Device>>> {
        let registry = self.snapshot();
        ids.iter()
            .map(|id| {
                registry
                    .devices
                    .get(*id)
                    .cloned()
                    .ok_or_else(|| Error::NotFound(id.to_string()))
            })
            .collect()
    }

    /// Apply `op` to every device concurrently.
    ///
    /// `completed` is true only if every device succeeded. A capability
    /// mismatch on any device is returned in place of the aggregate.
    async fn fan_out<F, Fut>(&self, ids: &[&str], op: F) -> Result<Completed>
    where
        F: Fn(Arc<Device>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let devices = self.resolve(ids)?;
        let results = join_all(devices.into_iter().map(|device| {
            let id = device.id().to_string();
            let pending = op(device);
            async move { (id, pending.await) }
        }))
        .await;

        let mut completed = true;
        let mut mismatch = None;
        for (id, result) in results {
            match result {
                Ok(()) => {}
                Err(e @ Error::CapabilityMismatch { .. }) => mismatch = Some(e),
                Err(e) => {
                    warn!("{id}: {e}");
                    completed = false;
                }
            }
        }
        match mismatch {
            Some(e) => Err(e),
            None => Ok(completed.into()),
        }
    }

    pub async fn get_toggle(&self, id: &str) -> Result<bool> {
        self.device(id)?.get_toggle().await
    }

    pub async fn put_toggle(&self, ids: &[&str], on: bool) -> Result<Completed> {
        self.fan_out(ids, |d| async move { d.set_toggle(on).await })
            .await
    }

    pub async fn get_brightness(&self, id: &str) -> Result<Percentage> {
        self.device(id)?.get_brightness().await
    }

    /// Set brightness, clamping `brightness` into 0-100.
    pub async fn put_brightness(&self, ids: &[&str], brightness: i64) -> Result<Completed> {
        let brightness = Percentage::clamped(brightness);
        self.fan_out(ids, |d| async move { d.set_brightness(brightness).await })
            .await
    }

    pub async fn get_color(&self, id: &str) -> Result<Hsv> {
        self.device(id)?.get_color().await
    }

    pub async fn put_color(&self, ids: &[&str], hsv: Hsv) -> Result<Completed> {
        self.fan_out(ids, |d| async move { d.set_color(hsv).await })
            .await
    }

    pub async fn get_rgb(&self, id: &str) -> Result<Rgb> {
        self.device(id)?.get_rgb().await
    }

    pub async fn put_rgb(&self, ids: &[&str], rgb: Rgb) -> Result<Completed> {
        self.fan_out(ids, |d| async move { d.set_rgb(rgb).await })
            .await
    }

    pub async fn get_mode(&self, id: &str) -> Result<Mode> {
        self.device(id)?.get_mode().await
    }

    pub async fn put_mode(&self, id: &str, mode: Mode) -> Result<ModeChange> {
        self.device(id)?.set_mode(mode).await
    }

    pub async fn get_white(&self, id: &str) -> Result<Percentage> {
        self.device(id)?.get_white().await
    }

    pub async fn put_white(&self, ids: &[&str], white: i64) -> Result<Completed> {
        let white = Percentage::clamped(white);
        self.fan_out(ids, |d| async move { d.set_white(white).await })
            .await
    }

    /// `None` means warmth is not applicable to the device's current state.
    pub async fn get_warmth(&self, id: &str) -> Result<Option<Percentage>> {
        self.device(id)?.get_warmth().await
    }

    pub async fn put_warmth(&self, ids: &[&str], warmth: i64) -> Result<Completed> {
        let warmth = Percentage::clamped(warmth);
        self.fan_out(ids, |d| async move { d.set_warmth(warmth).await })
            .await
    }

    pub async fn get_scene(&self, id: &str) -> Result<Scene> {
        self.device(id)?.get_scene().await
    }

    pub async fn put_scene(&self, ids: &[&str], scene: &Scene) -> Result<Completed> {
        self.fan_out(ids, |d| {
            let scene = scene.clone();
            async move { d.set_scene(&scene).await }
        })
        .await
    }

    pub async fn put_countdown(&self, ids: &[&str], seconds: u32) -> Result<Completed> {
        self.fan_out(ids, |d| async move { d.set_countdown(seconds).await })
            .await
    }

    pub async fn get_xy(&self, id: &str) -> Result<[f64; 2]> {
        self.device(id)?.get_xy().await
    }

    pub async fn put_xy(&self, ids: &[&str], x: f64, y: f64) -> Result<Completed> {
        self.fan_out(ids, |d| async move { d.set_xy(x, y).await })
            .await
    }

    pub async fn put_alert(&self, ids: &[&str], alert: Alert) -> Result<Completed> {
        self.fan_out(ids, |d| async move { d.set_alert(alert).await })
            .await
    }

    pub async fn put_effect(&self, ids: &[&str], effect: Effect) -> Result<Completed> {
        self.fan_out(ids, |d| async move { d.set_effect(effect).await })
            .await
    }

    pub async fn get_state(&self, id: &str) -> Result<LightState> {
        self.device(id)?.get_state().await
    }

    /// Switch the devices off at `at`. An instant in the past fires at once.
    ///
    /// Completes as soon as every switch-off is scheduled.
    pub async fn set_timer(&self, ids: &[&str], at: DateTime<Utc>) -> Result<Completed> {
        let devices = self.resolve(ids)?;
        try_join_all(devices.into_iter().map(|device| device.set_timer(at))).await?;
        Ok(true.into())
    }
}

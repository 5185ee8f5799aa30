//! Bulbs controlled directly over the LAN.

use std::str::FromStr;

use log::debug;
use serde_json::{Value, json};

use crate::errors::Error;
use crate::runtime::{BoxFuture, Mutex};
use crate::scene::Scene;
use crate::status::{LightState, ModeChange};
use crate::transport::{Datapoint, DatapointMap, LocalTransport};
use crate::types::{Hsv, Mode, Percentage};

use super::DeviceKind;

type Result<T> = std::result::Result<T, Error>;

const WHITE_MIN: u32 = 10;
const WHITE_MAX: u32 = 1000;
const MAX_COUNTDOWN: u32 = 86_400;

/// A local bulb behind a [`LocalTransport`].
///
/// The connection is opened lazily for each request and closed afterwards.
/// Requests to the same bulb run one at a time.
pub struct LocalDevice {
    id: String,
    name: Option<String>,
    transport: Box<dyn LocalTransport>,
    flight: Mutex<()>,
}

impl std::fmt::Debug for LocalDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDevice")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("connected", &self.transport.is_connected())
            .finish()
    }
}

impl LocalDevice {
    pub fn new(id: &str, name: Option<&str>, transport: impl LocalTransport + 'static) -> Self {
        LocalDevice {
            id: id.to_string(),
            name: name.map(String::from),
            transport: Box::new(transport),
            flight: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Run `op` with a connection, opening and closing one if needed.
    ///
    /// A failure while finding or connecting is reported as the failure of
    /// `op`. A connection opened here is closed on every return path.
    async fn with_connection<T, F>(&self, op: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t dyn LocalTransport) -> BoxFuture<'t, Result<T>>,
    {
        let _flight = self.flight.lock().await;
        let transport = self.transport.as_ref();

        let opened = !transport.is_connected();
        if opened {
            debug!("opening connection to {}", self.id);
            transport.find().await?;
            if let Err(e) = transport.connect().await {
                transport.disconnect().await;
                return Err(e);
            }
        }

        let result = op(transport).await;

        if opened {
            transport.disconnect().await;
        }
        result
    }

    pub async fn get_toggle(&self) -> Result<bool> {
        self.with_connection(|t| Box::pin(read_toggle(t))).await
    }

    pub async fn set_toggle(&self, on: bool) -> Result<()> {
        self.write(DatapointMap::from([(Datapoint::Switch, json!(on))]))
            .await
    }

    pub async fn get_mode(&self) -> Result<Mode> {
        self.with_connection(|t| Box::pin(read_mode(t))).await
    }

    /// Switch mode and report the brightness under the new mode.
    pub async fn set_mode(&self, mode: Mode) -> Result<ModeChange> {
        if !mode.is_local() {
            return Err(Error::unsupported(DeviceKind::Local, &format!("mode {mode}")));
        }
        self.with_connection(move |t| {
            Box::pin(async move {
                t.set(DatapointMap::from([(Datapoint::Mode, json!(mode.to_string()))]))
                    .await?;
                let brightness = read_brightness(t).await.ok();
                Ok(ModeChange {
                    completed: true,
                    brightness,
                })
            })
        })
        .await
    }

    pub async fn get_brightness(&self) -> Result<Percentage> {
        self.with_connection(|t| Box::pin(read_brightness(t))).await
    }

    /// Set brightness on whichever channel the current mode drives.
    pub async fn set_brightness(&self, brightness: Percentage) -> Result<()> {
        self.with_connection(move |t| {
            Box::pin(async move {
                let values = match read_mode(t).await? {
                    Mode::White => DatapointMap::from([(
                        Datapoint::WhiteBrightness,
                        json!(white_raw(brightness)),
                    )]),
                    Mode::Colour => {
                        let hsv = read_colour(t).await?.with_value(brightness.value());
                        DatapointMap::from([(Datapoint::Colour, json!(encode_hsv(&hsv)))])
                    }
                    Mode::Scene => {
                        let mut scene = read_scene(t).await?;
                        scene.set_value(brightness.value());
                        DatapointMap::from([(Datapoint::Scene, json!(scene.encode()))])
                    }
                    mode => {
                        return Err(Error::unsupported(
                            DeviceKind::Local,
                            &format!("brightness in {mode} mode"),
                        ));
                    }
                };
                t.set(values).await
            })
        })
        .await
    }

    pub async fn get_color(&self) -> Result<Hsv> {
        self.with_connection(|t| Box::pin(read_colour(t))).await
    }

    /// Set the color, switching to colour mode in the same command if needed.
    pub async fn set_color(&self, hsv: Hsv) -> Result<()> {
        self.set_in_mode(Mode::Colour, Datapoint::Colour, json!(encode_hsv(&hsv)))
            .await
    }

    /// White channel percentage.
    pub async fn get_white(&self) -> Result<Percentage> {
        self.with_connection(|t| Box::pin(read_white(t))).await
    }

    pub async fn set_white(&self, white: Percentage) -> Result<()> {
        self.set_in_mode(Mode::White, Datapoint::WhiteBrightness, json!(white_raw(white)))
            .await
    }

    pub async fn get_scene(&self) -> Result<Scene> {
        self.with_connection(|t| Box::pin(read_scene(t))).await
    }

    pub async fn set_scene(&self, scene: &Scene) -> Result<()> {
        if scene.segments.is_empty() {
            return Err(Error::malformed("scene has no segments"));
        }
        self.set_in_mode(Mode::Scene, Datapoint::Scene, json!(scene.encode()))
            .await
    }

    /// Seconds until the bulb switches itself off. Zero cancels.
    pub async fn set_countdown(&self, seconds: u32) -> Result<()> {
        self.write(DatapointMap::from([(
            Datapoint::Countdown,
            json!(seconds.min(MAX_COUNTDOWN)),
        )]))
        .await
    }

    pub async fn get_state(&self) -> Result<LightState> {
        self.with_connection(|t| {
            Box::pin(async move {
                let scene_brightness = match read_scene(t).await {
                    Ok(scene) => scene.value().map(|v| Percentage::clamped(i64::from(v))),
                    Err(e) => {
                        debug!("no scene brightness: {e}");
                        None
                    }
                };
                Ok(LightState {
                    toggle: read_toggle(t).await?,
                    mode: Some(read_mode(t).await?),
                    color: read_colour(t).await?,
                    white: Some(read_white(t).await?),
                    scene_brightness,
                })
            })
        })
        .await
    }

    async fn write(&self, values: DatapointMap) -> Result<()> {
        self.with_connection(move |t| t.set(values)).await
    }

    /// Write `datapoint`, adding a mode switch when the bulb is in another mode.
    async fn set_in_mode(&self, mode: Mode, datapoint: Datapoint, value: Value) -> Result<()> {
        self.with_connection(move |t| {
            Box::pin(async move {
                let mut values = DatapointMap::from([(datapoint, value)]);
                if read_mode(t).await? != mode {
                    values.insert(Datapoint::Mode, json!(mode.to_string()));
                }
                t.set(values).await
            })
        })
        .await
    }
}

async fn read_str(t: &dyn LocalTransport, datapoint: Datapoint) -> Result<String> {
    match t.get(datapoint).await? {
        Value::String(s) => Ok(s),
        other => Err(Error::malformed(format!(
            "datapoint {} should be a string, got {other}",
            datapoint.id()
        ))),
    }
}

async fn read_toggle(t: &dyn LocalTransport) -> Result<bool> {
    t.get(Datapoint::Switch)
        .await?
        .as_bool()
        .ok_or_else(|| Error::malformed("switch datapoint is not a boolean"))
}

async fn read_mode(t: &dyn LocalTransport) -> Result<Mode> {
    let raw = read_str(t, Datapoint::Mode).await?;
    Mode::from_str(&raw)
        .ok()
        .filter(Mode::is_local)
        .ok_or_else(|| Error::malformed(format!("unknown mode {raw:?}")))
}

async fn read_white(t: &dyn LocalTransport) -> Result<Percentage> {
    let raw = t
        .get(Datapoint::WhiteBrightness)
        .await?
        .as_u64()
        .ok_or_else(|| Error::malformed("white brightness is not a number"))?;
    Ok(Percentage::clamped((raw / 10) as i64))
}

async fn read_colour(t: &dyn LocalTransport) -> Result<Hsv> {
    decode_hsv(&read_str(t, Datapoint::Colour).await?)
}

async fn read_scene(t: &dyn LocalTransport) -> Result<Scene> {
    Scene::decode(&read_str(t, Datapoint::Scene).await?)
}

async fn read_brightness(t: &dyn LocalTransport) -> Result<Percentage> {
    match read_mode(t).await? {
        Mode::White => read_white(t).await,
        Mode::Colour => Ok(Percentage::clamped(i64::from(read_colour(t).await?.v))),
        Mode::Scene => read_scene(t)
            .await?
            .value()
            .map(|v| Percentage::clamped(i64::from(v)))
            .ok_or_else(|| Error::malformed("scene has no segments")),
        mode => Err(Error::unsupported(
            DeviceKind::Local,
            &format!("brightness in {mode} mode"),
        )),
    }
}

fn white_raw(white: Percentage) -> u32 {
    (u32::from(white.value()) * 10).clamp(WHITE_MIN, WHITE_MAX)
}

/// Decode a packed `HHHHSSSSVVVV` color.
///
/// Saturation and value are carried in tenths of a percent.
pub(crate) fn decode_hsv(raw: &str) -> Result<Hsv> {
    if raw.len() != 12 || !raw.is_ascii() {
        return Err(Error::malformed(format!("color {raw:?} is not 12 hex digits")));
    }
    let field = |at: usize| {
        i64::from_str_radix(&raw[at..at + 4], 16)
            .map_err(|e| Error::malformed(format!("color {raw:?}: {e}")))
    };
    Ok(Hsv::clamped(field(0)?, field(4)? / 10, field(8)? / 10))
}

pub(crate) fn encode_hsv(hsv: &Hsv) -> String {
    format!(
        "{:04x}{:04x}{:04x}",
        hsv.h,
        u16::from(hsv.s) * 10,
        u16::from(hsv.v) * 10
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::scene::{ChangeMode, SceneSegment};
    use crate::transport::fake::FakeTransport;

    fn bulb(values: &[(Datapoint, Value)]) -> (LocalDevice, FakeTransport) {
        let fake = FakeTransport::with(values);
        (LocalDevice::new("bulb", Some("Desk"), fake.clone()), fake)
    }

    #[tokio::test]
    async fn overlapping_writes_each_get_their_own_connection() {
        let (device, fake) = bulb(&[(Datapoint::Switch, json!(false))]);
        fake.slow_set.store(true, Ordering::SeqCst);

        let (first, second) = futures::join!(device.set_toggle(true), device.set_countdown(60));
        first.unwrap();
        second.unwrap();

        assert_eq!(
            fake.state.lock().events,
            ["connect", "set", "disconnect", "connect", "set", "disconnect"]
        );
        assert_eq!(fake.connects.load(Ordering::SeqCst), 2);
        assert_eq!(fake.writes().len(), 2);
    }

    #[test]
    fn packs_hsv_as_hex() {
        assert_eq!(encode_hsv(&Hsv::new(0, 100, 100)), "000003e803e8");
        assert_eq!(encode_hsv(&Hsv::new(240, 50, 20)), "00f001f400c8");
        assert_eq!(decode_hsv("00f001f400c8").unwrap(), Hsv::new(240, 50, 20));
        assert!(decode_hsv("00f001f4").is_err());
        assert!(decode_hsv("zzzz01f400c8").is_err());
    }

    #[tokio::test]
    async fn white_brightness_scales_by_ten() {
        let (device, fake) = bulb(&[
            (Datapoint::Mode, json!("white")),
            (Datapoint::WhiteBrightness, json!(500)),
        ]);
        assert_eq!(device.get_brightness().await.unwrap().value(), 50);

        device.set_brightness(Percentage::clamped(80)).await.unwrap();
        assert_eq!(fake.value(Datapoint::WhiteBrightness), Some(json!(800)));

        device.set_brightness(Percentage::clamped(0)).await.unwrap();
        assert_eq!(fake.value(Datapoint::WhiteBrightness), Some(json!(10)));
    }

    #[tokio::test]
    async fn colour_brightness_is_hsv_value() {
        let (device, fake) = bulb(&[
            (Datapoint::Mode, json!("colour")),
            (Datapoint::Colour, json!("007803e803e8")),
        ]);
        assert_eq!(device.get_brightness().await.unwrap().value(), 100);

        device.set_brightness(Percentage::clamped(25)).await.unwrap();
        assert_eq!(fake.value(Datapoint::Colour), Some(json!("007803e800fa")));
    }

    #[tokio::test]
    async fn scene_brightness_updates_every_segment() {
        let scene = Scene::new(vec![
            SceneSegment::color(11, 10, ChangeMode::Gradual, Hsv::new(0, 100, 100)),
            SceneSegment::color(11, 10, ChangeMode::Jump, Hsv::new(120, 100, 60)),
        ]);
        let (device, fake) = bulb(&[
            (Datapoint::Mode, json!("scene")),
            (Datapoint::Scene, json!(scene.encode())),
        ]);
        assert_eq!(device.get_brightness().await.unwrap().value(), 100);

        device.set_brightness(Percentage::clamped(40)).await.unwrap();
        let written = fake.value(Datapoint::Scene).unwrap();
        let decoded = Scene::decode(written.as_str().unwrap()).unwrap();
        assert!(decoded.segments.iter().all(|segment| segment.v == 40));
    }

    #[tokio::test]
    async fn music_mode_has_no_brightness() {
        let (device, fake) = bulb(&[(Datapoint::Mode, json!("music"))]);
        let err = device.set_brightness(Percentage::clamped(50)).await.unwrap_err();
        assert!(matches!(err, Error::CapabilityMismatch { .. }));
        assert!(fake.writes().is_empty());
    }

    #[tokio::test]
    async fn color_switches_mode_in_one_command() {
        let (device, fake) = bulb(&[(Datapoint::Mode, json!("white"))]);
        device.set_color(Hsv::new(0, 100, 100)).await.unwrap();

        let writes = fake.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0][&Datapoint::Mode], json!("colour"));
        assert_eq!(writes[0][&Datapoint::Colour], json!("000003e803e8"));
    }

    #[tokio::test]
    async fn color_in_colour_mode_skips_mode_write() {
        let (device, fake) = bulb(&[(Datapoint::Mode, json!("colour"))]);
        device.set_color(Hsv::new(60, 50, 50)).await.unwrap();
        assert!(!fake.writes()[0].contains_key(&Datapoint::Mode));
    }

    #[tokio::test]
    async fn connection_is_scoped_to_each_request() {
        let (device, fake) = bulb(&[(Datapoint::Switch, json!(false))]);
        device.set_toggle(true).await.unwrap();
        assert!(device.get_toggle().await.unwrap());

        assert_eq!(fake.connects.load(Ordering::SeqCst), 2);
        let state = fake.state.lock();
        assert_eq!(state.finds, 2);
        assert_eq!(state.disconnects, 2);
        drop(state);
        assert!(!fake.is_connected());
    }

    #[tokio::test]
    async fn failed_write_still_disconnects() {
        let (device, fake) = bulb(&[]);
        fake.fail_set.store(true, Ordering::SeqCst);
        let err = device.set_toggle(true).await.unwrap_err();
        assert!(matches!(err, Error::TransportFailure { .. }));
        assert_eq!(fake.state.lock().disconnects, 1);
    }

    #[tokio::test]
    async fn connect_failure_is_the_write_failure() {
        let (device, fake) = bulb(&[]);
        fake.fail_connect.store(true, Ordering::SeqCst);
        let err = device.set_toggle(true).await.unwrap_err();
        assert_eq!(err.outcome(), crate::Outcome::TransportFailure);
        assert!(fake.writes().is_empty());
    }

    #[tokio::test]
    async fn mode_change_reports_new_brightness() {
        let (device, fake) = bulb(&[
            (Datapoint::Mode, json!("colour")),
            (Datapoint::WhiteBrightness, json!(300)),
        ]);
        let change = device.set_mode(Mode::White).await.unwrap();
        assert!(change.completed);
        assert_eq!(change.brightness.map(|b| b.value()), Some(30));
        assert_eq!(fake.value(Datapoint::Mode), Some(json!("white")));

        let err = device.set_mode(Mode::Ct).await.unwrap_err();
        assert!(matches!(err, Error::CapabilityMismatch { .. }));
    }

    #[tokio::test]
    async fn empty_scene_is_rejected_before_the_wire() {
        let (device, fake) = bulb(&[(Datapoint::Mode, json!("scene"))]);
        assert!(device.set_scene(&Scene::default()).await.is_err());
        assert_eq!(fake.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn state_collects_every_field() {
        let (device, _) = bulb(&[
            (Datapoint::Switch, json!(true)),
            (Datapoint::Mode, json!("colour")),
            (Datapoint::Colour, json!("00f001f400c8")),
            (Datapoint::WhiteBrightness, json!(1000)),
        ]);
        let state = device.get_state().await.unwrap();
        assert!(state.toggle);
        assert_eq!(state.mode, Some(Mode::Colour));
        assert_eq!(state.color, Hsv::new(240, 50, 20));
        assert_eq!(state.white.map(|w| w.value()), Some(100));
        assert_eq!(state.scene_brightness, None);
    }
}

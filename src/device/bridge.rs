//! Lights reached through a bridge.
//!
//! The bridge speaks its own units: hue 0-65535, saturation and brightness
//! 0-254, color temperature 153-500 mireds. Conversion to canonical units
//! happens here, rounding only at the boundary.

use std::sync::Arc;
use std::time::Duration;

use crate::bridge::{Alert, BridgeClient, BridgeLightState, Effect, StatePayload};
use crate::errors::Error;
use crate::status::{LightState, ModeChange};
use crate::types::{Hsv, Mode, Percentage};
use crate::warmth::{HueSat, WarmthTable};

use super::DeviceKind;

type Result<T> = std::result::Result<T, Error>;

const HUE_MAX: f64 = 65535.0;
const LEVEL_MAX: u32 = 254;
const CT_MIN: u16 = 153;
const CT_MAX: u16 = 500;
const CT_SPAN: f64 = 346.0;

/// One light behind a bridge.
#[derive(Debug, Clone)]
pub struct BridgeDevice {
    id: String,
    name: Option<String>,
    index: u32,
    client: BridgeClient,
    warmth: Arc<WarmthTable>,
    transition: Option<u16>,
}

impl BridgeDevice {
    pub fn new(
        id: &str,
        name: Option<&str>,
        index: u32,
        client: BridgeClient,
        warmth: Arc<WarmthTable>,
    ) -> Self {
        BridgeDevice {
            id: id.to_string(),
            name: name.map(String::from),
            index,
            client,
            warmth,
            transition: None,
        }
    }

    /// Fade every change over `transition`, in steps of 100ms.
    pub fn with_transition(mut self, transition: Duration) -> Self {
        self.transition = Some((transition.as_millis() / 100).min(u128::from(u16::MAX)) as u16);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    async fn read(&self) -> Result<BridgeLightState> {
        self.client.get_state(self.index).await
    }

    async fn write(&self, mut payload: StatePayload) -> Result<()> {
        payload.transitiontime = payload.transitiontime.or(self.transition);
        self.client.set_state(self.index, &payload).await
    }

    pub async fn get_toggle(&self) -> Result<bool> {
        Ok(self.read().await?.on)
    }

    pub async fn set_toggle(&self, on: bool) -> Result<()> {
        self.write(StatePayload {
            on: Some(on),
            ..Default::default()
        })
        .await
    }

    pub async fn get_mode(&self) -> Result<Mode> {
        color_mode(&self.read().await?)
    }

    /// Re-send the current value of the requested color space, which makes the
    /// bridge render in it.
    pub async fn set_mode(&self, mode: Mode) -> Result<ModeChange> {
        if !mode.is_bridge() {
            return Err(Error::unsupported(DeviceKind::Bridge, &format!("mode {mode}")));
        }
        let state = self.read().await?;
        let missing = || Error::unsupported(DeviceKind::Bridge, &format!("mode {mode} on this light"));
        let payload = match mode {
            Mode::Ct => StatePayload {
                ct: Some(state.ct.ok_or_else(missing)?),
                ..Default::default()
            },
            Mode::Xy => StatePayload {
                xy: Some(state.xy.ok_or_else(missing)?),
                ..Default::default()
            },
            _ => StatePayload {
                hue: Some(state.hue.ok_or_else(missing)?),
                sat: Some(state.sat.ok_or_else(missing)?),
                bri: state.bri,
                ..Default::default()
            },
        };
        self.write(payload).await?;
        Ok(ModeChange {
            completed: true,
            brightness: None,
        })
    }

    /// Brightness, or the white percentage while rendering color temperature.
    pub async fn get_brightness(&self) -> Result<Percentage> {
        let state = self.read().await?;
        if state.colormode.as_deref() == Some("ct") {
            return white_of(&state);
        }
        state
            .bri
            .map(|bri| Percentage::scale_from(u32::from(bri), LEVEL_MAX))
            .ok_or_else(|| Error::unsupported(DeviceKind::Bridge, "brightness on this light"))
    }

    pub async fn set_brightness(&self, brightness: Percentage) -> Result<()> {
        let state = self.read().await?;
        let payload = if state.colormode.as_deref() == Some("ct") {
            StatePayload {
                ct: Some(ct_from_white(brightness)),
                ..Default::default()
            }
        } else {
            StatePayload {
                bri: Some(brightness.scale_to(LEVEL_MAX) as u8),
                ..Default::default()
            }
        };
        self.write(payload).await
    }

    pub async fn get_color(&self) -> Result<Hsv> {
        hsv_of(&self.read().await?)
    }

    pub async fn set_color(&self, hsv: Hsv) -> Result<()> {
        self.write(StatePayload {
            hue: Some(hue_to_bridge(hsv.h)),
            sat: Some(Percentage::clamped(i64::from(hsv.s)).scale_to(LEVEL_MAX) as u8),
            bri: Some(Percentage::clamped(i64::from(hsv.v)).scale_to(LEVEL_MAX) as u8),
            ..Default::default()
        })
        .await
    }

    /// Color temperature as a percentage of the supported range.
    pub async fn get_white(&self) -> Result<Percentage> {
        white_of(&self.read().await?)
    }

    pub async fn set_white(&self, white: Percentage) -> Result<()> {
        self.write(StatePayload {
            ct: Some(ct_from_white(white)),
            ..Default::default()
        })
        .await
    }

    /// Warmth of the current color, if it is a calibrated warm white.
    /// `None` when the light has no hue/saturation or the pair is uncalibrated.
    pub async fn get_warmth(&self) -> Result<Option<Percentage>> {
        let Ok(hsv) = hsv_of(&self.read().await?) else {
            return Ok(None);
        };
        Ok(self.warmth.warmth(HueSat {
            hue: hsv.h,
            sat: hsv.s,
        }))
    }

    pub async fn set_warmth(&self, warmth: Percentage) -> Result<()> {
        let HueSat { hue, sat } = self.warmth.hue_sat(warmth.value()).ok_or_else(|| {
            Error::unsupported(
                DeviceKind::Bridge,
                &format!("uncalibrated warmth {}%", warmth.value()),
            )
        })?;
        self.write(StatePayload {
            hue: Some(hue_to_bridge(hue)),
            sat: Some(Percentage::clamped(i64::from(sat)).scale_to(LEVEL_MAX) as u8),
            ..Default::default()
        })
        .await
    }

    pub async fn get_xy(&self) -> Result<[f64; 2]> {
        self.read()
            .await?
            .xy
            .ok_or_else(|| Error::unsupported(DeviceKind::Bridge, "xy on this light"))
    }

    /// Set CIE coordinates, each clamped into 0-1.
    pub async fn set_xy(&self, x: f64, y: f64) -> Result<()> {
        self.write(StatePayload {
            xy: Some([x.clamp(0.0, 1.0), y.clamp(0.0, 1.0)]),
            ..Default::default()
        })
        .await
    }

    pub async fn set_alert(&self, alert: Alert) -> Result<()> {
        self.write(StatePayload {
            alert: Some(alert),
            ..Default::default()
        })
        .await
    }

    pub async fn set_effect(&self, effect: Effect) -> Result<()> {
        self.write(StatePayload {
            effect: Some(effect),
            ..Default::default()
        })
        .await
    }

    pub async fn get_state(&self) -> Result<LightState> {
        let state = self.read().await?;
        Ok(LightState {
            toggle: state.on,
            mode: color_mode(&state).ok(),
            color: hsv_of(&state).unwrap_or_default(),
            white: white_of(&state).ok(),
            scene_brightness: None,
        })
    }
}

fn color_mode(state: &BridgeLightState) -> Result<Mode> {
    match state.colormode.as_deref() {
        Some("hs") => Ok(Mode::Hs),
        Some("xy") => Ok(Mode::Xy),
        Some("ct") => Ok(Mode::Ct),
        Some(other) => Err(Error::malformed(format!("unknown color mode {other:?}"))),
        None => Err(Error::unsupported(DeviceKind::Bridge, "mode on this light")),
    }
}

fn hsv_of(state: &BridgeLightState) -> Result<Hsv> {
    let (Some(hue), Some(sat)) = (state.hue, state.sat) else {
        return Err(Error::unsupported(DeviceKind::Bridge, "color on this light"));
    };
    let bri = state.bri.unwrap_or(LEVEL_MAX as u8);
    Ok(Hsv::new(
        hue_from_bridge(hue),
        Percentage::scale_from(u32::from(sat), LEVEL_MAX).value(),
        Percentage::scale_from(u32::from(bri), LEVEL_MAX).value(),
    ))
}

fn white_of(state: &BridgeLightState) -> Result<Percentage> {
    state
        .ct
        .map(white_from_ct)
        .ok_or_else(|| Error::unsupported(DeviceKind::Bridge, "color temperature on this light"))
}

fn hue_to_bridge(h: u16) -> u16 {
    (f64::from(h.min(Hsv::MAX_HUE)) / 360.0 * HUE_MAX).round() as u16
}

fn hue_from_bridge(hue: u16) -> u16 {
    (f64::from(hue) / HUE_MAX * 360.0).round() as u16
}

fn white_from_ct(ct: u16) -> Percentage {
    let ct = ct.clamp(CT_MIN, CT_MAX);
    Percentage::clamped((f64::from(ct - CT_MIN) / CT_SPAN * 100.0).round() as i64)
}

fn ct_from_white(white: Percentage) -> u16 {
    let ct = f64::from(CT_MIN) + f64::from(white.value()) * CT_SPAN / 100.0;
    (ct.round() as u16).clamp(CT_MIN, CT_MAX)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn light(server: &MockServer, state: serde_json::Value) -> BridgeDevice {
        Mock::given(method("GET"))
            .and(path("/api/token/lights/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "Hall", "modelid": "LCT015", "state": state
            })))
            .mount(server)
            .await;
        let client = BridgeClient::new(&server.uri(), "token").unwrap();
        let table = WarmthTable::builtin().unwrap();
        BridgeDevice::new("2", Some("Hall"), 2, client, Arc::new(table))
    }

    async fn expect_put(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("PUT"))
            .and(path("/api/token/lights/2/state"))
            .and(body_json(body))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"success": {}}])))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn converts_units_at_the_boundary() {
        assert_eq!(hue_to_bridge(360), 65535);
        assert_eq!(hue_to_bridge(180), 32768);
        assert_eq!(hue_from_bridge(32768), 180);
        assert_eq!(white_from_ct(153).value(), 0);
        assert_eq!(white_from_ct(499).value(), 100);
        assert_eq!(white_from_ct(366).value(), 62);
        assert_eq!(ct_from_white(Percentage::clamped(0)), 153);
        assert_eq!(ct_from_white(Percentage::clamped(100)), 499);
    }

    #[tokio::test]
    async fn reads_color_in_canonical_units() {
        let server = MockServer::start().await;
        let device = light(&server, json!({"on": true, "hue": 21845, "sat": 254, "bri": 127, "colormode": "hs"})).await;
        assert_eq!(device.get_color().await.unwrap(), Hsv::new(120, 100, 50));
        assert_eq!(device.get_mode().await.unwrap(), Mode::Hs);
        assert_eq!(device.get_brightness().await.unwrap().value(), 50);
    }

    #[tokio::test]
    async fn writes_color_as_one_partial_update() {
        let server = MockServer::start().await;
        let device = light(&server, json!({"on": true})).await;
        expect_put(&server, json!({"hue": 43690, "sat": 127, "bri": 254})).await;
        device.set_color(Hsv::new(240, 50, 100)).await.unwrap();
    }

    #[tokio::test]
    async fn brightness_follows_white_in_ct_mode() {
        let server = MockServer::start().await;
        let device = light(&server, json!({"on": true, "bri": 254, "ct": 326, "colormode": "ct"})).await;
        assert_eq!(device.get_brightness().await.unwrap().value(), 50);

        expect_put(&server, json!({"ct": 222})).await;
        device.set_brightness(Percentage::clamped(20)).await.unwrap();
    }

    #[tokio::test]
    async fn uncalibrated_warmth_is_a_capability_mismatch() {
        let server = MockServer::start().await;
        let device = light(&server, json!({"on": true})).await;
        let err = device.set_warmth(Percentage::clamped(55)).await.unwrap_err();
        assert!(matches!(err, Error::CapabilityMismatch { kind: DeviceKind::Bridge, .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn warmth_is_read_through_the_inverse_table() {
        let server = MockServer::start().await;
        let table = WarmthTable::builtin().unwrap();
        let HueSat { hue, sat } = table.hue_sat(0).unwrap();
        let device = light(
            &server,
            json!({"on": true, "hue": hue_to_bridge(hue), "sat": Percentage::clamped(i64::from(sat)).scale_to(LEVEL_MAX), "bri": 254}),
        )
        .await;
        assert_eq!(device.get_warmth().await.unwrap().map(|p| p.value()), Some(0));
    }

    #[tokio::test]
    async fn warmth_on_a_white_only_light_is_not_applicable() {
        let server = MockServer::start().await;
        let device = light(&server, json!({"on": true, "ct": 366, "colormode": "ct"})).await;
        assert_eq!(device.get_warmth().await.unwrap(), None);
    }

    #[tokio::test]
    async fn mode_switch_rewrites_current_value() {
        let server = MockServer::start().await;
        let device = light(&server, json!({"on": true, "xy": [0.3, 0.3], "ct": 400, "colormode": "xy"})).await;
        expect_put(&server, json!({"ct": 400})).await;

        let change = device.set_mode(Mode::Ct).await.unwrap();
        assert!(change.completed);

        let err = device.set_mode(Mode::Scene).await.unwrap_err();
        assert!(matches!(err, Error::CapabilityMismatch { .. }));
    }

    #[tokio::test]
    async fn transition_is_added_to_writes() {
        let server = MockServer::start().await;
        let device = light(&server, json!({"on": false}))
            .await
            .with_transition(Duration::from_millis(400));
        expect_put(&server, json!({"on": true, "transitiontime": 4})).await;
        device.set_toggle(true).await.unwrap();
    }
}

//! Keyed-datapoint transport to local bulbs.
//!
//! A local bulb exposes its state as numbered datapoints. [`LocalTransport`] is
//! the seam between device logic and the wire: [`TuyaTransport`] speaks the
//! real protocol, tests substitute an in-memory fake.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::errors::Error;
use crate::runtime::BoxFuture;

pub(crate) mod frame;
mod tuya;

pub use tuya::TuyaTransport;

pub type Result<T> = std::result::Result<T, Error>;

/// Indexed datapoints of a local color bulb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Datapoint {
    /// On/off, boolean.
    Switch,
    /// `white`, `colour`, `scene` or `music`.
    Mode,
    /// White channel, 10-1000.
    WhiteBrightness,
    /// Packed `HHHHSSSSVVVV` hex string.
    Colour,
    /// Multi-segment scene hex string.
    Scene,
    /// Seconds until the bulb switches off, 0-86400.
    Countdown,
}

impl Datapoint {
    pub fn id(&self) -> u8 {
        match self {
            Datapoint::Switch => 20,
            Datapoint::Mode => 21,
            Datapoint::WhiteBrightness => 22,
            Datapoint::Colour => 24,
            Datapoint::Scene => 25,
            Datapoint::Countdown => 26,
        }
    }

    /// The JSON object key used on the wire.
    pub fn key(&self) -> String {
        self.id().to_string()
    }
}

/// Datapoints written together in a single command.
pub type DatapointMap = BTreeMap<Datapoint, Value>;

/// Connection-oriented client for one local bulb.
///
/// Futures are boxed so devices can hold any transport behind `dyn`.
pub trait LocalTransport: Send + Sync {
    /// Resolve the bulb's network address if it is not yet known.
    fn find(&self) -> BoxFuture<'_, Result<()>>;

    /// Open the connection.
    fn connect(&self) -> BoxFuture<'_, Result<()>>;

    /// Close the connection. Closing an idle transport is a no-op.
    fn disconnect(&self) -> BoxFuture<'_, ()>;

    fn is_connected(&self) -> bool;

    /// Read one datapoint.
    fn get(&self, datapoint: Datapoint) -> BoxFuture<'_, Result<Value>>;

    /// Write one or more datapoints in a single command.
    fn set(&self, values: DatapointMap) -> BoxFuture<'_, Result<()>>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory transport for device tests.

    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub struct FakeState {
        pub values: HashMap<Datapoint, Value>,
        pub writes: Vec<DatapointMap>,
        pub finds: usize,
        pub disconnects: usize,
        /// Connection lifecycle and writes, in the order they happened.
        pub events: Vec<&'static str>,
    }

    /// Remembers every write and lets tests inject failures.
    #[derive(Clone, Default)]
    pub struct FakeTransport {
        pub state: Arc<Mutex<FakeState>>,
        connected: Arc<AtomicBool>,
        pub fail_connect: Arc<AtomicBool>,
        pub fail_set: Arc<AtomicBool>,
        /// Make `set` yield to the scheduler before it lands.
        pub slow_set: Arc<AtomicBool>,
        pub connects: Arc<AtomicUsize>,
    }

    impl FakeTransport {
        pub fn with(values: &[(Datapoint, Value)]) -> Self {
            let fake = FakeTransport::default();
            fake.state.lock().values.extend(values.iter().cloned());
            fake
        }

        pub fn value(&self, datapoint: Datapoint) -> Option<Value> {
            self.state.lock().values.get(&datapoint).cloned()
        }

        pub fn writes(&self) -> Vec<DatapointMap> {
            self.state.lock().writes.clone()
        }
    }

    impl LocalTransport for FakeTransport {
        fn find(&self) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move {
                self.state.lock().finds += 1;
                Ok(())
            })
        }

        fn connect(&self) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move {
                if self.fail_connect.load(Ordering::SeqCst) {
                    return Err(Error::transport("connect", "refused"));
                }
                self.connects.fetch_add(1, Ordering::SeqCst);
                self.connected.store(true, Ordering::SeqCst);
                self.state.lock().events.push("connect");
                Ok(())
            })
        }

        fn disconnect(&self) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                let mut state = self.state.lock();
                state.disconnects += 1;
                state.events.push("disconnect");
                self.connected.store(false, Ordering::SeqCst);
            })
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn get(&self, datapoint: Datapoint) -> BoxFuture<'_, Result<Value>> {
            Box::pin(async move {
                self.value(datapoint)
                    .ok_or_else(|| Error::transport("get", format!("no datapoint {}", datapoint.id())))
            })
        }

        fn set(&self, values: DatapointMap) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move {
                if self.fail_set.load(Ordering::SeqCst) {
                    return Err(Error::transport("set", "timed out"));
                }
                if self.slow_set.load(Ordering::SeqCst) {
                    for _ in 0..3 {
                        tokio::task::yield_now().await;
                    }
                }
                let mut state = self.state.lock();
                state.events.push("set");
                state.values.extend(values.iter().map(|(dp, v)| (*dp, v.clone())));
                state.writes.push(values);
                Ok(())
            })
        }
    }
}

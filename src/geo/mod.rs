//! Geolocation: the lookup contract, an ipinfo-compatible HTTP client, and
//! a background runner that keeps slow lookups off the caller's thread.
//!
//! Locators are constructed explicitly and injected; nothing here holds
//! global state or a built-in credential.

pub mod countries;
pub mod ipinfo;

use std::net::Ipv4Addr;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ForensicError, Result};
use crate::model::evidence::GeoLocation;

pub use self::ipinfo::IpInfoClient;

/// Maps an IPv4 address to an approximate location.
///
/// Every failure (network, credential, quota, private address, missing
/// data) is reported as `GeolocationUnavailable`.
pub trait GeoLocator: Send + Sync {
    fn locate(&self, ip: Ipv4Addr) -> Result<GeoLocation>;
}

/// A locator that never looks anything up, for `--no-geo` and
/// `geolocation.enabled = false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledLocator;

impl GeoLocator for DisabledLocator {
    fn locate(&self, ip: Ipv4Addr) -> Result<GeoLocation> {
        Err(ForensicError::geo(ip, "geolocation is disabled"))
    }
}

/// A lookup running on a background thread.
///
/// Dropping the handle abandons the lookup; the worker finishes on its own
/// and its result is discarded.
pub struct PendingLookup {
    ip: Ipv4Addr,
    rx: mpsc::Receiver<Result<GeoLocation>>,
}

/// Start a lookup on a named background thread.
pub fn spawn_lookup(locator: Arc<dyn GeoLocator>, ip: Ipv4Addr) -> PendingLookup {
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("geolocation".into())
        .spawn(move || {
            debug!(%ip, "Geolocation lookup started");
            // The receiver may be gone if the caller gave up
            let _ = tx.send(locator.locate(ip));
        });
    if let Err(e) = spawned {
        warn!(%ip, error = %e, "Failed to spawn geolocation thread");
    }
    PendingLookup { ip, rx }
}

impl PendingLookup {
    /// The address being looked up.
    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// Block for at most `timeout` waiting for the result.
    pub fn wait(self, timeout: Duration) -> Result<GeoLocation> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(ForensicError::geo(
                self.ip,
                format!("lookup timed out after {}s", timeout.as_secs_f32()),
            )),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(ForensicError::geo(
                self.ip,
                "lookup worker ended without a result",
            )),
        }
    }

    /// Poll without blocking. `None` while the lookup is still running.
    pub fn try_result(&self) -> Option<Result<GeoLocation>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(ForensicError::geo(
                self.ip,
                "lookup worker ended without a result",
            ))),
        }
    }
}

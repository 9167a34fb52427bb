//! Platform deadline used to bound waits.
//!
//! A [`Deadline`] is fixed when it is created and needs no runtime for
//! that. The timer future itself is only built by [`Deadline::elapsed`],
//! which natively must run inside a tokio runtime.

use std::time::Duration;

/// Fallback horizon when `now + timeout` overflows the platform clock.
#[cfg(not(target_arch = "wasm32"))]
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[cfg(not(target_arch = "wasm32"))]
pub(crate) struct Deadline(tokio::time::Instant);

#[cfg(not(target_arch = "wasm32"))]
impl Deadline {
    pub(crate) fn after(timeout: Duration) -> Self {
        let now = tokio::time::Instant::now();
        Self(now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE))
    }

    pub(crate) fn elapsed(self) -> tokio::time::Sleep {
        tokio::time::sleep_until(self.0)
    }
}

#[cfg(all(target_arch = "wasm32", not(feature = "web")))]
compile_error!("wasm32 builds require the `web` feature");

/// Largest delay `setTimeout` honors; it reads the delay as a signed
/// 32-bit integer and fires at once when it overflows.
#[cfg(any(test, all(target_arch = "wasm32", feature = "web")))]
const MAX_TIMEOUT_MS: u32 = 0x7FFF_FFFF;

#[cfg(any(test, all(target_arch = "wasm32", feature = "web")))]
fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).map_or(MAX_TIMEOUT_MS, |ms| ms.min(MAX_TIMEOUT_MS))
}

// The browser timer starts counting as soon as it is created.
#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub(crate) struct Deadline(gloo_timers::future::TimeoutFuture);

#[cfg(all(target_arch = "wasm32", feature = "web"))]
impl Deadline {
    pub(crate) fn after(timeout: Duration) -> Self {
        Self(gloo_timers::future::TimeoutFuture::new(timeout_millis(timeout)))
    }

    pub(crate) fn elapsed(self) -> gloo_timers::future::TimeoutFuture {
        self.0
    }
}

#[cfg(test)]
#[path = "timer_test.rs"]
mod tests;

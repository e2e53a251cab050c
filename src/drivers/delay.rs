// Blocking delay that yields while it waits
//
// Wraps any embedded-hal DelayNs (esp_hal::delay::Delay on the C3) and
// chops the wait into slices, calling the idle hook before each one.
// delay(0) still yields once, so a zero delay works as a plain yield.
//
// The wrapped delay has no clock of its own, so time spent in other
// fibers is not deducted: the wait is a minimum, often longer.

use embedded_hal::delay::DelayNs;

use crate::config::DEFAULT_DELAY_SLICE_US;
use crate::kernel::idle::idle;

pub struct YieldingDelay<D> {
    inner: D,
    slice_ns: u32,
}

impl<D: DelayNs> YieldingDelay<D> {
    pub fn new(inner: D) -> Self {
        Self::with_slice_us(inner, DEFAULT_DELAY_SLICE_US)
    }

    /// Yield at least every `slice_us` microseconds of waiting.
    pub fn with_slice_us(inner: D, slice_us: u32) -> Self {
        Self {
            inner,
            slice_ns: slice_us.saturating_mul(1_000).max(1),
        }
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: DelayNs> DelayNs for YieldingDelay<D> {
    fn delay_ns(&mut self, ns: u32) {
        if ns == 0 {
            idle();
            return;
        }

        let mut remaining = ns;
        while remaining > 0 {
            idle();
            let step = remaining.min(self.slice_ns);
            self.inner.delay_ns(step);
            remaining -= step;
        }
    }
}

// Idle hook: the one call site blocking waits use to let other fibers run
//
// Delay loops and busy-waits call idle() while they spin. By default
// that yields to the next fiber ("idle-yield" feature). Firmware that
// wants explicit yields only, or extra work while idle, installs its own
// hook once at startup with set_idle_hook().
//
// The hook is read inside a critical section but run outside it: on
// RISC-V a critical section masks MIE, which the mode guard would read
// as handler context and turn the yield into a no-op.

use core::cell::Cell;

use critical_section::Mutex;

#[cfg(feature = "idle-yield")]
const DEFAULT_HOOK: Option<fn()> = Some(super::scheduler::yield_now as fn());
#[cfg(not(feature = "idle-yield"))]
const DEFAULT_HOOK: Option<fn()> = None;

static IDLE_HOOK: Mutex<Cell<Option<fn()>>> = Mutex::new(Cell::new(DEFAULT_HOOK));

/// Replace the idle hook; `None` makes idle() do nothing.
pub fn set_idle_hook(hook: Option<fn()>) {
    critical_section::with(|cs| IDLE_HOOK.borrow(cs).set(hook));
}

pub fn idle_hook() -> Option<fn()> {
    critical_section::with(|cs| IDLE_HOOK.borrow(cs).get())
}

/// Called by wait primitives while they wait.
#[inline]
pub fn idle() {
    if let Some(hook) = idle_hook() {
        hook();
    }
}

// Cooperative fibers for single-core microcontrollers (ESP32-C3, Cortex-M0)
//
// Firmware starts extra "loops" with start_loop(); each gets its own
// stack and runs until it calls yield_now() (directly, or through a
// YieldingDelay / the idle hook). Round robin, no preemption, no teardown.
//
// Hosted x86_64/aarch64 backends exist so the scheduler runs for real
// under `cargo test`.

#![cfg_attr(target_os = "none", no_std)]

extern crate alloc;

pub mod arch;
pub mod config;
pub mod drivers;
pub mod kernel;

pub use arch::in_switchable_context;
pub use config::DEFAULT_STACK_SIZE;
pub use drivers::delay::YieldingDelay;
pub use kernel::fiber::{FiberId, FiberInfo, LoopFn};
pub use kernel::idle::{idle, set_idle_hook};
pub use kernel::scheduler::{
    StartError, current_fiber, fiber_count, for_each_fiber, start_default_loop, start_loop,
    start_loop_in, yield_now,
};
pub use kernel::stack::{HeapStacks, StackAllocator, StackLayout};

#[cfg(not(target_os = "none"))]
pub use arch::hosted;

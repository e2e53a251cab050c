// Cooperative fiber kernel
// Single core, no preemption. Fibers switch only in yield_now() and
// start_loop(); interrupt handlers run on whatever stack is live and
// never switch.
//
// fiber:     fiber records and ids
// stack:     stack block layout and the allocator seam
// ring:      circular run order and the "current" cursor
// scheduler: public entry points, built on arch::{switch_context, bootstrap}
// idle:      hook wait primitives call to yield

pub mod fiber;
pub mod idle;
pub(crate) mod ring;
pub mod scheduler;
pub mod stack;

pub use scheduler::{StartError, start_loop, yield_now};

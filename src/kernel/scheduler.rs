// Round-robin cooperative scheduler: yield_now() and start_loop()
//
// Both check the mode guard first; from an interrupt handler yield_now
// is a silent no-op and start_loop reports NotAllowed. "current" is
// updated before switch_context runs, so anything that reads it while
// the switch is in flight (an ISR, say) already sees the new fiber.
//
// No &mut Ring is held across a switch: the other side of the switch
// will take its own.

use core::fmt;
use core::ptr::NonNull;

use log::{debug, trace, warn};

use crate::arch;
use crate::config::DEFAULT_STACK_SIZE;
use crate::kernel::fiber::{Fiber, FiberId, FiberInfo, LoopFn};
use crate::kernel::ring::ring;
use crate::kernel::stack::{HeapStacks, StackAllocator, StackLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
    /// No memory for the stack; a smaller stack size may still fit.
    OutOfMemory,
    /// Called from an interrupt handler (or with interrupts masked).
    NotAllowed,
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::OutOfMemory => write!(f, "out of memory for fiber stack"),
            StartError::NotAllowed => write!(f, "fibers cannot be started from this context"),
        }
    }
}

impl core::error::Error for StartError {}

/// Let the next fiber in the ring run.
///
/// Returns once every other fiber has had its turn. Ignored when called
/// from an interrupt handler.
pub fn yield_now() {
    if !arch::in_switchable_context() {
        return;
    }

    let (from, to) = unsafe { (*ring()).advance() };
    unsafe { switch(from, to) };
}

/// Start `entry` as a new loop with a `stack_size`-byte stack.
///
/// The new fiber runs immediately and keeps calling `entry` until it
/// yields; this call returns once the ring comes back around.
pub fn start_loop(entry: LoopFn, stack_size: usize) -> Result<(), StartError> {
    start_loop_in(&HeapStacks, entry, stack_size)
}

/// [`start_loop`] with [`DEFAULT_STACK_SIZE`].
pub fn start_default_loop(entry: LoopFn) -> Result<(), StartError> {
    start_loop(entry, DEFAULT_STACK_SIZE)
}

/// [`start_loop`] with stack memory from `stacks`.
pub fn start_loop_in<A>(stacks: &A, entry: LoopFn, stack_size: usize) -> Result<(), StartError>
where
    A: StackAllocator + ?Sized,
{
    if !arch::in_switchable_context() {
        return Err(StartError::NotAllowed);
    }

    let Some(layout) = StackLayout::for_stack_size(stack_size) else {
        warn!("fiber stack of {} bytes is not representable", stack_size);
        return Err(StartError::OutOfMemory);
    };
    let Some(block) = stacks.allocate(layout.layout()) else {
        warn!("no memory for a {} byte fiber stack", layout.block_size());
        return Err(StartError::OutOfMemory);
    };

    let (from, to) = unsafe {
        let ring = &mut *ring();
        let id = ring.allocate_id();
        let fiber = Fiber::create_in(block, &layout, id, entry);
        ring.insert_after_current(fiber);
        (ring.make_current(fiber), fiber)
    };
    debug!(
        "{} started ({} byte stack, {} fibers)",
        unsafe { to.as_ref() }.id(),
        stack_size,
        fiber_count()
    );

    unsafe { switch(from, to) };
    Ok(())
}

/// The fiber running right now.
pub fn current_fiber() -> FiberId {
    let current = unsafe { (*ring()).current() };
    unsafe { current.as_ref() }.id()
}

/// Fibers in the ring, main included.
pub fn fiber_count() -> usize {
    unsafe { (*ring()).len() }
}

/// Walk the ring once, starting at the current fiber.
pub fn for_each_fiber(f: impl FnMut(FiberInfo)) {
    unsafe { (*ring()).for_each(f) }
}

/// # Safety
/// `from` must be the fiber executing this call and `to` a live fiber
/// that is suspended (or freshly bootstrapped).
unsafe fn switch(from: NonNull<Fiber>, to: NonNull<Fiber>) {
    if from == to {
        return;
    }

    let (from, to) = unsafe { (&mut *from.as_ptr(), &*to.as_ptr()) };
    debug_assert_eq!(to.context.stack_pointer() % arch::STACK_ALIGN, 0);
    trace!("switch {} -> {}", from.id(), to.id());

    unsafe { arch::switch_context(&mut from.context, &to.context) };
}

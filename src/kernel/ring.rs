// The fiber ring: circular singly linked list plus the "current" cursor
//
// Plain pointer bookkeeping, no register or stack work. The scheduler
// decides when to call switch_context; the ring only says who is next.
//
// The ring lives in a static (one per thread on hosted builds, so
// parallel tests each get their own) and must not move once
// initialized: the main fiber links to itself.

use core::cell::UnsafeCell;
use core::ptr::NonNull;

use crate::kernel::fiber::{Fiber, FiberId, FiberInfo};

pub(crate) struct Ring {
    main: Fiber,
    // null until first use
    current: *mut Fiber,
    len: usize,
    next_id: u32,
}

impl Ring {
    pub(crate) const fn new() -> Self {
        Self {
            main: Fiber::main(),
            current: core::ptr::null_mut(),
            len: 1,
            next_id: 1,
        }
    }

    fn ensure_init(&mut self) -> NonNull<Fiber> {
        match NonNull::new(self.current) {
            Some(current) => current,
            None => {
                let main = NonNull::from(&mut self.main);
                self.main.next = main;
                self.current = main.as_ptr();
                main
            }
        }
    }

    pub(crate) fn current(&mut self) -> NonNull<Fiber> {
        self.ensure_init()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn allocate_id(&mut self) -> FiberId {
        let id = FiberId::new(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    /// Link `fiber` in directly after the current fiber so it runs next.
    ///
    /// # Safety
    /// `fiber` must be live for the rest of the program and not already
    /// in the ring.
    pub(crate) unsafe fn insert_after_current(&mut self, fiber: NonNull<Fiber>) {
        let current = self.ensure_init();
        unsafe {
            (*fiber.as_ptr()).next = (*current.as_ptr()).next;
            (*current.as_ptr()).next = fiber;
        }
        self.len += 1;
    }

    /// Make `fiber` current; returns the fiber that was current.
    pub(crate) fn make_current(&mut self, fiber: NonNull<Fiber>) -> NonNull<Fiber> {
        let previous = self.ensure_init();
        self.current = fiber.as_ptr();
        previous
    }

    /// Step the cursor one link; returns (previous, new current).
    pub(crate) fn advance(&mut self) -> (NonNull<Fiber>, NonNull<Fiber>) {
        let previous = self.ensure_init();
        let next = unsafe { previous.as_ref() }.next;
        self.current = next.as_ptr();
        (previous, next)
    }

    /// Visit every fiber once, starting with the current one.
    pub(crate) fn for_each(&mut self, mut f: impl FnMut(FiberInfo)) {
        let start = self.ensure_init();
        let mut fiber = start;
        loop {
            let record = unsafe { fiber.as_ref() };
            f(record.info());
            fiber = record.next;
            if fiber == start {
                break;
            }
        }
    }
}

struct RingCell(UnsafeCell<Ring>);

// Single core; only thread-mode code touches the ring (mode guard), and
// never from two places at once.
#[cfg(target_os = "none")]
unsafe impl Sync for RingCell {}

#[cfg(target_os = "none")]
static RING: RingCell = RingCell(UnsafeCell::new(Ring::new()));

#[cfg(not(target_os = "none"))]
std::thread_local! {
    static RING: RingCell = const { RingCell(UnsafeCell::new(Ring::new())) };
}

/// The process-wide ring. Raw pointer on purpose: callers must not hold
/// a reference to it across switch_context.
#[cfg(target_os = "none")]
pub(crate) fn ring() -> *mut Ring {
    RING.0.get()
}

#[cfg(not(target_os = "none"))]
pub(crate) fn ring() -> *mut Ring {
    RING.with(|cell| cell.0.get())
}

// Fiber records
//
// A fiber record sits at the low end of its own stack block; the stack
// grows down towards it from the top of the block. The main fiber is the
// exception: its record lives in the ring and it runs on the boot stack.

use core::fmt;
use core::ptr::NonNull;

use crate::arch::{self, Context};
use crate::kernel::stack::StackLayout;

/// A loop body. The scheduler calls it forever; it should yield somewhere.
pub type LoopFn = fn();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FiberId(u32);

impl FiberId {
    /// The fiber that was running before any loop was started.
    pub const MAIN: FiberId = FiberId(0);

    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn is_main(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_main() {
            write!(f, "fiber#main")
        } else {
            write!(f, "fiber#{}", self.0)
        }
    }
}

/// Snapshot of one ring entry, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiberInfo {
    pub id: FiberId,
    /// Usable stack bytes as requested at start; 0 for the main fiber.
    pub stack_size: usize,
    /// Trampoline a bootstrapped fiber first resumed at; 0 for main.
    pub resume_address: usize,
}

#[repr(C)]
pub struct Fiber {
    pub(crate) context: Context,
    // never dangling once the ring is initialized
    pub(crate) next: NonNull<Fiber>,
    id: FiberId,
    stack_size: usize,
}

impl Fiber {
    pub(crate) const fn main() -> Self {
        Self {
            context: Context::new(),
            next: NonNull::dangling(),
            id: FiberId::MAIN,
            stack_size: 0,
        }
    }

    /// Write a fiber record at the start of `block` and bootstrap the
    /// stack above it so the first switch lands in `entry`'s run loop.
    /// The returned record links to itself until it joins a ring.
    ///
    /// # Safety
    /// `block` must be a fresh allocation of `layout.layout()` that is
    /// never freed or reused.
    pub(crate) unsafe fn create_in(
        block: NonNull<u8>,
        layout: &StackLayout,
        id: FiberId,
        entry: LoopFn,
    ) -> NonNull<Fiber> {
        let fiber = block.cast::<Fiber>();
        unsafe {
            fiber.as_ptr().write(Fiber {
                context: Context::new(),
                next: fiber,
                id,
                stack_size: layout.stack_size(),
            });
            let top = block.as_ptr().add(layout.block_size());
            arch::bootstrap(&mut (*fiber.as_ptr()).context, top, entry);
        }
        fiber
    }

    pub fn id(&self) -> FiberId {
        self.id
    }

    pub fn info(&self) -> FiberInfo {
        FiberInfo {
            id: self.id,
            stack_size: self.stack_size,
            resume_address: self.context.resume_address(),
        }
    }
}

impl fmt::Debug for Fiber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("id", &self.id)
            .field("sp", &format_args!("{:#x}", self.context.stack_pointer()))
            .field("stack_size", &self.stack_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::stack::{HeapStacks, StackAllocator};

    fn nop() {}

    #[test]
    fn id_display() {
        assert_eq!(FiberId::MAIN.to_string(), "fiber#main");
        assert_eq!(FiberId::new(3).to_string(), "fiber#3");
        assert!(FiberId::MAIN.is_main());
        assert!(!FiberId::new(1).is_main());
    }

    #[test]
    fn bootstrapped_fiber_is_self_linked_and_aligned() {
        let layout = StackLayout::for_stack_size(256).unwrap();
        let block = HeapStacks.allocate(layout.layout()).unwrap();
        let fiber = unsafe { Fiber::create_in(block, &layout, FiberId::new(7), nop) };
        let record = unsafe { fiber.as_ref() };

        assert_eq!(record.next, fiber);
        assert_eq!(record.id(), FiberId::new(7));
        assert_eq!(record.context.stack_pointer() % arch::STACK_ALIGN, 0);

        // the image sits entirely inside the reserve at the top of the block
        let top = block.as_ptr() as usize + layout.block_size();
        assert_eq!(top - record.context.stack_pointer(), arch::CONTEXT_RESERVE);

        let info = record.info();
        assert_eq!(info.stack_size, 256);
        assert_ne!(info.resume_address, 0);
    }

    #[test]
    fn entry_sits_just_above_the_register_image() {
        let layout = StackLayout::for_stack_size(128).unwrap();
        let block = HeapStacks.allocate(layout.layout()).unwrap();
        let fiber = unsafe { Fiber::create_in(block, &layout, FiberId::new(1), nop) };
        let sp = unsafe { fiber.as_ref() }.context.stack_pointer();

        let entry_slot = (sp + arch::CONTEXT_WORDS * arch::WORD) as *const usize;
        assert_eq!(unsafe { entry_slot.read() }, nop as LoopFn as usize);
    }

    #[test]
    fn main_fiber_has_no_stack() {
        let main = Fiber::main();
        assert_eq!(
            main.info(),
            FiberInfo {
                id: FiberId::MAIN,
                stack_size: 0,
                resume_address: 0,
            }
        );
    }
}

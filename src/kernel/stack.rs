// Fiber stack blocks
//
// One allocation per fiber, never freed:
//
//   base                                                         top
//   | Fiber record | ........ usable stack ........ | ctx reserve |
//   |<- header   ->|<-------------------- extent --------------->|
//
// Both parts are rounded to STACK_ALIGN, so the top is aligned whenever
// the base is. The reserve keeps the requested size fully usable even
// while a suspended fiber's register image sits on its stack.

use core::alloc::Layout;
use core::mem::size_of;
use core::ptr::NonNull;

use crate::arch::{CONTEXT_RESERVE, STACK_ALIGN};
use crate::kernel::fiber::Fiber;

/// Size and alignment of a fiber's stack block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackLayout {
    stack_size: usize,
    header: usize,
    extent: usize,
}

impl StackLayout {
    /// `None` when the sizes overflow the address space.
    pub fn for_stack_size(stack_size: usize) -> Option<Self> {
        let header = round_up(size_of::<Fiber>(), STACK_ALIGN)?;
        let extent = round_up(stack_size.checked_add(CONTEXT_RESERVE)?, STACK_ALIGN)?;
        let total = header.checked_add(extent)?;
        // rejects totals past isize::MAX
        Layout::from_size_align(total, STACK_ALIGN).ok()?;
        Some(Self {
            stack_size,
            header,
            extent,
        })
    }

    /// Usable bytes, as requested.
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Bytes between the fiber record and the top of the block.
    pub fn extent(&self) -> usize {
        self.extent
    }

    pub fn header_size(&self) -> usize {
        self.header
    }

    pub fn block_size(&self) -> usize {
        self.header + self.extent
    }

    pub fn layout(&self) -> Layout {
        // checked in for_stack_size
        unsafe { Layout::from_size_align_unchecked(self.block_size(), STACK_ALIGN) }
    }
}

const fn round_up(value: usize, align: usize) -> Option<usize> {
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Source of fiber stack memory.
///
/// Called once per started loop. Return `None` on exhaustion; the
/// scheduler reports that as `OutOfMemory` and does not retry.
pub trait StackAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;
}

impl<A: StackAllocator + ?Sized> StackAllocator for &A {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        (**self).allocate(layout)
    }
}

/// Stacks from the global allocator (esp-alloc's heap on the ESP32-C3).
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapStacks;

impl StackAllocator for HeapStacks {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        // layout is never zero-sized: the header alone is non-empty
        NonNull::new(unsafe { alloc::alloc::alloc(layout) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_size_is_fully_usable() {
        for size in [0, 1, 7, 8, 100, 4096, 4097] {
            let layout = StackLayout::for_stack_size(size).unwrap();
            assert_eq!(layout.stack_size(), size);
            assert!(layout.extent() >= size + CONTEXT_RESERVE);
            assert!(layout.extent() < size + CONTEXT_RESERVE + STACK_ALIGN);
            assert_eq!(layout.extent() % STACK_ALIGN, 0);
            assert!(layout.header_size() >= size_of::<Fiber>());
            assert_eq!(layout.block_size() % STACK_ALIGN, 0);
        }
    }

    #[test]
    fn layout_is_stack_aligned() {
        let layout = StackLayout::for_stack_size(4096).unwrap().layout();
        assert_eq!(layout.align(), STACK_ALIGN);
        let block = HeapStacks.allocate(layout).unwrap();
        assert_eq!(block.as_ptr() as usize % STACK_ALIGN, 0);
    }

    #[test]
    fn oversized_requests_are_rejected() {
        assert_eq!(StackLayout::for_stack_size(usize::MAX), None);
        assert_eq!(StackLayout::for_stack_size(usize::MAX - CONTEXT_RESERVE), None);
        assert_eq!(StackLayout::for_stack_size(isize::MAX as usize), None);
    }

    #[test]
    fn round_up_to_power_of_two() {
        assert_eq!(round_up(0, 8), Some(0));
        assert_eq!(round_up(1, 8), Some(8));
        assert_eq!(round_up(8, 8), Some(8));
        assert_eq!(round_up(9, 16), Some(16));
        assert_eq!(round_up(usize::MAX, 8), None);
    }
}

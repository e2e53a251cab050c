// Per-architecture context switch, bootstrap and mode guard
//
// Everything that touches registers or hand-builds stack frames lives
// under arch/. The rest of the crate only sees Context (an opaque saved
// stack pointer) and the three functions re-exported here.
//
// Contract every backend implements:
//   - full-descending stack, STACK_ALIGN at every call boundary
//   - switch_context pushes CONTEXT_WORDS words (return address plus all
//     callee-saved GPRs, padded to STACK_ALIGN), stores sp into
//     current.sp, loads next.sp, pops the same image and returns
//   - bootstrap writes an identical image whose return slot points at a
//     trampoline, with BOOT_WORDS words above it (entry fn + padding);
//     the trampoline pops the entry, realigns sp and calls run_loop
//
// Porting to a new core means adding one file here, nothing else.

use core::mem::{offset_of, size_of};

use crate::kernel::fiber::LoopFn;

pub mod layout;

// Soft-float Arm only: thumbv6m saves no s16-s31.
#[cfg(all(target_arch = "arm", target_os = "none", not(target_abi = "eabihf")))]
mod thumbv6m;
#[cfg(all(target_arch = "arm", target_os = "none", not(target_abi = "eabihf")))]
use thumbv6m as imp;

#[cfg(all(target_arch = "riscv32", target_os = "none"))]
mod riscv32;
#[cfg(all(target_arch = "riscv32", target_os = "none"))]
use riscv32 as imp;

#[cfg(all(target_arch = "x86_64", unix))]
mod x86_64;
#[cfg(all(target_arch = "x86_64", unix))]
use x86_64 as imp;

#[cfg(all(target_arch = "aarch64", unix))]
mod aarch64;
#[cfg(all(target_arch = "aarch64", unix))]
use aarch64 as imp;

#[cfg(all(target_arch = "arm", target_os = "none", target_abi = "eabihf"))]
compile_error!("pulp-fibers does not save FPU registers; build for a soft-float (eabi) target");

#[cfg(not(any(
    all(target_arch = "arm", target_os = "none"),
    all(target_arch = "riscv32", target_os = "none"),
    all(target_arch = "x86_64", unix),
    all(target_arch = "aarch64", unix),
)))]
compile_error!("pulp-fibers has no context switch backend for this target");

#[cfg(not(target_os = "none"))]
pub mod hosted;

pub use imp::{GEOMETRY, switch_context};

#[cfg(target_os = "none")]
pub use imp::in_switchable_context;
#[cfg(not(target_os = "none"))]
pub use hosted::in_switchable_context;

pub const WORD: usize = size_of::<usize>();
pub const STACK_ALIGN: usize = GEOMETRY.stack_align;
pub const CONTEXT_WORDS: usize = GEOMETRY.context_words;
pub const BOOT_WORDS: usize = GEOMETRY.boot_words;

/// Bytes a fiber stack must hold beyond what its loop uses: one saved
/// image plus the bootstrap words above it.
pub const CONTEXT_RESERVE: usize = GEOMETRY.reserve();

const _: () = assert!(GEOMETRY.word == WORD);
const _: () = assert!(GEOMETRY.is_consistent());

/// Whether code running with the given interrupt state may switch.
///
/// Masked interrupts mean a critical section or a trap entry; a raised
/// priority level means an interrupt handler, even one that re-enabled
/// interrupts to allow nesting.
#[cfg_attr(not(all(target_arch = "riscv32", target_os = "none")), allow(dead_code))]
pub(crate) const fn switchable(interrupts_enabled: bool, runlevel_raised: bool) -> bool {
    interrupts_enabled && !runlevel_raised
}

/// Saved machine state of a suspended fiber.
///
/// The register image itself lives on the fiber's stack; only the stack
/// pointer is kept here. The assembly reads and writes `sp` at offset 0.
#[repr(C)]
#[derive(Debug, Default)]
pub struct Context {
    pub(crate) sp: usize,
    // first instruction of a bootstrapped fiber (its trampoline);
    // 0 for the main fiber
    pub(crate) resume: usize,
}

const _: () = assert!(offset_of!(Context, sp) == 0);

impl Context {
    pub const fn new() -> Self {
        Self { sp: 0, resume: 0 }
    }

    pub fn stack_pointer(&self) -> usize {
        self.sp
    }

    pub fn resume_address(&self) -> usize {
        self.resume
    }
}

/// Build the first register image for a fiber on a fresh stack.
///
/// # Safety
/// `stack_top` must be the STACK_ALIGN-aligned end of a writable block
/// of at least CONTEXT_RESERVE bytes that nothing else uses.
pub unsafe fn bootstrap(context: &mut Context, stack_top: *mut u8, entry: LoopFn) {
    debug_assert!(stack_top as usize % STACK_ALIGN == 0);
    let mut stack = unsafe { StackPusher::new(stack_top) };
    let resume = unsafe { imp::push_boot_image(&mut stack, entry) };
    debug_assert_eq!(stack.depth(), CONTEXT_RESERVE);
    context.sp = stack.sp();
    context.resume = resume;
}

/// Full-descending stack writer used to lay down bootstrap images.
pub(crate) struct StackPusher {
    top: usize,
    sp: *mut usize,
}

impl StackPusher {
    /// # Safety
    /// Every word this pusher writes below `top` must be owned by the caller.
    unsafe fn new(top: *mut u8) -> Self {
        Self {
            top: top as usize,
            sp: top.cast(),
        }
    }

    pub(crate) unsafe fn push(&mut self, word: usize) {
        unsafe {
            self.sp = self.sp.sub(1);
            self.sp.write(word);
        }
    }

    pub(crate) unsafe fn push_zeroed(&mut self, words: usize) {
        for _ in 0..words {
            unsafe { self.push(0) };
        }
    }

    pub(crate) fn sp(&self) -> usize {
        self.sp as usize
    }

    fn depth(&self) -> usize {
        self.top - self.sp as usize
    }
}

// Bottom frame of every bootstrapped fiber; the trampolines call this.
// entry arrives as a plain code address in the first argument register.
#[allow(improper_ctypes_definitions)]
extern "C" fn run_loop(entry: LoopFn) -> ! {
    loop {
        entry();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop() {}

    #[test]
    fn bootstrap_fills_the_slots_geometry_names() {
        let mut words = vec![usize::MAX; 64];
        let top = unsafe { words.as_mut_ptr().add(words.len()) }.cast::<u8>();
        let top = (top as usize & !(STACK_ALIGN - 1)) as *mut u8;
        let mut context = Context::new();
        unsafe { bootstrap(&mut context, top, nop) };

        let sp = context.stack_pointer() as *const usize;
        let slot = |i: usize| unsafe { sp.add(i).read() };
        assert_eq!(top as usize - context.stack_pointer(), CONTEXT_RESERVE);
        assert_eq!(slot(GEOMETRY.resume_slot), context.resume_address());
        assert_eq!(slot(GEOMETRY.entry_slot), nop as LoopFn as usize);
        for i in (0..CONTEXT_WORDS).filter(|&i| i != GEOMETRY.resume_slot) {
            assert_eq!(slot(i), 0, "word {i} of a fresh image");
        }
    }

    #[test]
    fn only_unmasked_base_level_code_switches() {
        assert!(switchable(true, false));
        // critical section, or trap entry before any re-enable
        assert!(!switchable(false, false));
        // nested handler that turned interrupts back on
        assert!(!switchable(true, true));
        assert!(!switchable(false, true));
    }
}

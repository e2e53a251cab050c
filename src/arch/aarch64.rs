// AArch64 (AAPCS64) backend (hosted; runs the scheduler under cargo test)
//
// Callee-saved: x19-x28, fp (x29), lr (x30), and the low halves of
// v8-v15. 20 words, already a multiple of 16 bytes.
//
// Saved image, offsets from the saved sp:
//
//   0..80     x19 .. x28
//   80, 88    fp, lr (return address)
//   96..160   d8 .. d15
//
// Bootstrap adds 16 bytes above: entry fn at +160, then padding.

use super::layout::{self, Geometry};
use super::{Context, StackPusher};
use crate::kernel::fiber::LoopFn;

pub const GEOMETRY: Geometry = layout::AARCH64;

/// Save the running fiber into `current` and resume `next`.
///
/// # Safety
/// Both pointers must be live. `next.sp` must hold an image produced by
/// this function or by `bootstrap`.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context(_current: *mut Context, _next: *const Context) {
    // x0 = current, x1 = next
    core::arch::naked_asm!(
        "sub sp, sp, #160",
        "stp x19, x20, [sp, #0]",
        "stp x21, x22, [sp, #16]",
        "stp x23, x24, [sp, #32]",
        "stp x25, x26, [sp, #48]",
        "stp x27, x28, [sp, #64]",
        "stp x29, x30, [sp, #80]",
        "stp d8, d9, [sp, #96]",
        "stp d10, d11, [sp, #112]",
        "stp d12, d13, [sp, #128]",
        "stp d14, d15, [sp, #144]",
        "mov x9, sp",
        "str x9, [x0]",
        "ldr x9, [x1]",
        "mov sp, x9",
        "ldp x19, x20, [sp, #0]",
        "ldp x21, x22, [sp, #16]",
        "ldp x23, x24, [sp, #32]",
        "ldp x25, x26, [sp, #48]",
        "ldp x27, x28, [sp, #64]",
        "ldp x29, x30, [sp, #80]",
        "ldp d8, d9, [sp, #96]",
        "ldp d10, d11, [sp, #112]",
        "ldp d12, d13, [sp, #128]",
        "ldp d14, d15, [sp, #144]",
        "add sp, sp, #160",
        "ret",
    );
}

// First code a bootstrapped fiber runs. sp points at the entry fn.
#[unsafe(naked)]
unsafe extern "C" fn trampoline() -> ! {
    core::arch::naked_asm!(
        "ldr x0, [sp], #16",
        "bl {run_loop}",
        "brk #1",
        run_loop = sym super::run_loop,
    );
}

pub(super) unsafe fn push_boot_image(stack: &mut StackPusher, entry: LoopFn) -> usize {
    let resume = trampoline as *const () as usize;
    unsafe {
        stack.push(0);
        stack.push(entry as usize);
        // d15 .. d8
        stack.push_zeroed(8);
        // lr, fp
        stack.push(resume);
        stack.push(0);
        // x28 .. x19
        stack.push_zeroed(10);
    }
    resume
}

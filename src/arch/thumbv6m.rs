// Armv6-M (Cortex-M0/M0+) backend, AAPCS
//
// Callee-saved: r4-r11 and sp (r9 treated as v6). push/pop can only name
// r0-r7 plus lr/pc, so the high registers go through r2-r5 in a second
// batch. r3 rides along in the first batch as padding so the image is
// 10 words and the saved sp stays 8-byte aligned.
//
// Saved image, lowest address first (sp points at word 0):
//
//   0..4   r8 r9 r10 r11
//   4      r3 (padding, caller-saved)
//   5..9   r4 r5 r6 r7
//   9      return address (lr on save, popped into pc)
//
// Bootstrap adds two words above: the entry fn, then padding.

use cortex_m::peripheral::SCB;
use cortex_m::peripheral::scb::VectActive;

use super::layout::{self, Geometry};
use super::{Context, StackPusher};
use crate::kernel::fiber::LoopFn;

pub const GEOMETRY: Geometry = layout::ARMV6M;

/// Save the running fiber into `current` and resume `next`.
///
/// # Safety
/// Both pointers must be live. `next.sp` must hold an image produced by
/// this function or by `bootstrap`. Must not run in handler mode.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context(_current: *mut Context, _next: *const Context) {
    // r0 = current, r1 = next
    core::arch::naked_asm!(
        "push {{r3-r7, lr}}",
        "mov r2, r8",
        "mov r3, r9",
        "mov r4, r10",
        "mov r5, r11",
        "push {{r2-r5}}",
        // capture sp only after both batches
        "mov r2, sp",
        "str r2, [r0, #0]",
        "ldr r2, [r1, #0]",
        "mov sp, r2",
        // same batches, reverse order
        "pop {{r2-r5}}",
        "mov r8, r2",
        "mov r9, r3",
        "mov r10, r4",
        "mov r11, r5",
        "pop {{r3-r7, pc}}",
    );
}

// First code a bootstrapped fiber runs. sp points at the entry fn.
#[unsafe(naked)]
unsafe extern "C" fn trampoline() -> ! {
    core::arch::naked_asm!(
        "pop {{r0}}",
        "mov r1, sp",
        "movs r2, #7",
        "bics r1, r2",
        "mov sp, r1",
        "bl {run_loop}",
        "udf #0",
        run_loop = sym super::run_loop,
    );
}

pub(super) unsafe fn push_boot_image(stack: &mut StackPusher, entry: LoopFn) -> usize {
    // fn addresses carry the Thumb bit, which `pop {pc}` requires
    let resume = trampoline as *const () as usize;
    unsafe {
        stack.push(0);
        stack.push(entry as usize);
        stack.push(resume);
        // r7 r6 r5 r4 r3, then r11 r10 r9 r8
        stack.push_zeroed(5);
        stack.push_zeroed(4);
    }
    resume
}

/// Thread mode (no active exception) is the only place a switch is safe.
pub fn in_switchable_context() -> bool {
    SCB::vect_active() == VectActive::ThreadMode
}

// RV32 (ESP32-C3, ilp32) backend
//
// Callee-saved: ra, s0-s11. The psABI wants sp 16-byte aligned, so the
// 13 registers sit in a 64-byte frame with three padding words.
//
// Saved image, offsets from the saved sp:
//
//   0..48   s0 .. s11
//   48      ra (return address)
//   52..64  padding
//
// Bootstrap adds 16 bytes above the frame: entry fn at +64, padding.

use super::layout::{self, Geometry};
use super::{Context, StackPusher};
use crate::kernel::fiber::LoopFn;

pub const GEOMETRY: Geometry = layout::RV32;

const FRAME: usize = GEOMETRY.frame_bytes();
const RA: usize = GEOMETRY.resume_slot * GEOMETRY.word;
const BOOT: usize = GEOMETRY.boot_bytes();

/// Save the running fiber into `current` and resume `next`.
///
/// # Safety
/// Both pointers must be live. `next.sp` must hold an image produced by
/// this function or by `bootstrap`. Must not run inside a trap handler.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context(_current: *mut Context, _next: *const Context) {
    // a0 = current, a1 = next
    core::arch::naked_asm!(
        "addi sp, sp, -{frame}",
        "sw s0, 0(sp)",
        "sw s1, 4(sp)",
        "sw s2, 8(sp)",
        "sw s3, 12(sp)",
        "sw s4, 16(sp)",
        "sw s5, 20(sp)",
        "sw s6, 24(sp)",
        "sw s7, 28(sp)",
        "sw s8, 32(sp)",
        "sw s9, 36(sp)",
        "sw s10, 40(sp)",
        "sw s11, 44(sp)",
        "sw ra, {ra}(sp)",
        "sw sp, 0(a0)",
        "lw sp, 0(a1)",
        "lw s0, 0(sp)",
        "lw s1, 4(sp)",
        "lw s2, 8(sp)",
        "lw s3, 12(sp)",
        "lw s4, 16(sp)",
        "lw s5, 20(sp)",
        "lw s6, 24(sp)",
        "lw s7, 28(sp)",
        "lw s8, 32(sp)",
        "lw s9, 36(sp)",
        "lw s10, 40(sp)",
        "lw s11, 44(sp)",
        "lw ra, {ra}(sp)",
        "addi sp, sp, {frame}",
        "ret",
        frame = const FRAME,
        ra = const RA,
    );
}

// First code a bootstrapped fiber runs. sp points at the entry fn;
// dropping the whole 16-byte slot restores alignment.
#[unsafe(naked)]
unsafe extern "C" fn trampoline() -> ! {
    core::arch::naked_asm!(
        "lw a0, 0(sp)",
        "addi sp, sp, {boot}",
        "call {run_loop}",
        "unimp",
        boot = const BOOT,
        run_loop = sym super::run_loop,
    );
}

pub(super) unsafe fn push_boot_image(stack: &mut StackPusher, entry: LoopFn) -> usize {
    let resume = trampoline as *const () as usize;
    unsafe {
        // boot slot: padding x3, entry fn lowest
        stack.push_zeroed(3);
        stack.push(entry as usize);
        // frame: padding x3, ra, s11 .. s0
        stack.push_zeroed(3);
        stack.push(resume);
        stack.push_zeroed(12);
    }
    resume
}

/// Trap entry and critical sections run with MIE clear. esp-hal
/// handlers re-enable MIE to nest, but keep the runlevel raised until
/// they return.
pub fn in_switchable_context() -> bool {
    super::switchable(riscv::register::mstatus::read().mie(), runlevel_raised())
}

#[cfg(feature = "esp32c3")]
fn runlevel_raised() -> bool {
    use esp_hal::interrupt::{Priority, current_runlevel};

    !matches!(current_runlevel(), Priority::None)
}

#[cfg(not(feature = "esp32c3"))]
fn runlevel_raised() -> bool {
    false
}

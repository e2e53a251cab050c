// x86_64 System V backend (hosted; runs the scheduler under cargo test)
//
// Callee-saved: rbx, rbp, r12-r15. The call that enters switch_context
// leaves rsp at 8 mod 16; six pushes plus one padding push (rax) bring
// the saved rsp back to a 16-byte boundary.
//
// Saved image, lowest address first:
//
//   0   rax (padding)
//   1   r15   2 r14   3 r13   4 r12   5 rbx   6 rbp
//   7   return address
//
// Bootstrap adds two words above: the entry fn, then padding.

use super::layout::{self, Geometry};
use super::{Context, StackPusher};
use crate::kernel::fiber::LoopFn;

pub const GEOMETRY: Geometry = layout::X86_64;

/// Save the running fiber into `current` and resume `next`.
///
/// # Safety
/// Both pointers must be live. `next.sp` must hold an image produced by
/// this function or by `bootstrap`.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context(_current: *mut Context, _next: *const Context) {
    // rdi = current, rsi = next
    core::arch::naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "push rax",
        "mov [rdi], rsp",
        "mov rsp, [rsi]",
        "pop rax",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    );
}

// First code a bootstrapped fiber runs. rsp points at the entry fn.
#[unsafe(naked)]
unsafe extern "C" fn trampoline() -> ! {
    core::arch::naked_asm!(
        "pop rdi",
        "and rsp, -16",
        "call {run_loop}",
        "ud2",
        run_loop = sym super::run_loop,
    );
}

pub(super) unsafe fn push_boot_image(stack: &mut StackPusher, entry: LoopFn) -> usize {
    let resume = trampoline as *const () as usize;
    unsafe {
        stack.push(0);
        stack.push(entry as usize);
        stack.push(resume);
        // rbp rbx r12 r13 r14 r15 rax
        stack.push_zeroed(7);
    }
    resume
}

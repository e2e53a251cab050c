// Mode guard for hosted builds
//
// A host process has no handler mode, so "interrupt context" is a
// per-thread depth counter. Tests wrap code in in_handler() to stand in
// for an ISR running on top of the current fiber.

use std::cell::Cell;

std::thread_local! {
    static HANDLER_DEPTH: Cell<u32> = const { Cell::new(0) };
}

pub fn in_switchable_context() -> bool {
    HANDLER_DEPTH.with(|depth| depth.get() == 0)
}

/// Run `f` as if it were an interrupt handler; nests.
pub fn in_handler<R>(f: impl FnOnce() -> R) -> R {
    struct Exit;

    impl Drop for Exit {
        fn drop(&mut self) {
            HANDLER_DEPTH.with(|depth| depth.set(depth.get() - 1));
        }
    }

    HANDLER_DEPTH.with(|depth| depth.set(depth.get() + 1));
    let _exit = Exit;
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_scope_nests_and_unwinds() {
        assert!(in_switchable_context());
        in_handler(|| {
            assert!(!in_switchable_context());
            in_handler(|| assert!(!in_switchable_context()));
            assert!(!in_switchable_context());
        });
        assert!(in_switchable_context());
    }
}

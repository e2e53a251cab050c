// Build-time configuration
//
// DEFAULT_STACK_SIZE can be overridden with PULP_FIBERS_STACK_SIZE at
// build time (decimal, or hex with 0x). A bad value fails the build.
//
// 4 KiB is a compromise for 32 KiB-class SRAM parts: interrupt
// handlers borrow whichever fiber stack is live, so going lower is a
// gamble, and going higher leaves room for fewer loops.

const FALLBACK_STACK_SIZE: usize = 4096;

/// Stack size used by [`start_default_loop`](crate::start_default_loop).
pub const DEFAULT_STACK_SIZE: usize = match option_env!("PULP_FIBERS_STACK_SIZE") {
    Some(raw) => parse_stack_size(raw),
    None => FALLBACK_STACK_SIZE,
};

/// Slice length used by [`YieldingDelay::new`](crate::YieldingDelay::new).
pub const DEFAULT_DELAY_SLICE_US: u32 = 1_000;

pub(crate) const fn parse_stack_size(raw: &str) -> usize {
    let bytes = raw.as_bytes();
    let (radix, mut i) = if bytes.len() > 2 && bytes[0] == b'0' && (bytes[1] == b'x' || bytes[1] == b'X') {
        (16, 2)
    } else {
        (10, 0)
    };
    if i == bytes.len() {
        panic!("PULP_FIBERS_STACK_SIZE is empty");
    }

    let mut value: usize = 0;
    while i < bytes.len() {
        let digit = match bytes[i] {
            b'0'..=b'9' => (bytes[i] - b'0') as usize,
            b'a'..=b'f' if radix == 16 => (bytes[i] - b'a' + 10) as usize,
            b'A'..=b'F' if radix == 16 => (bytes[i] - b'A' + 10) as usize,
            b'_' => {
                i += 1;
                continue;
            }
            _ => panic!("PULP_FIBERS_STACK_SIZE is not a number"),
        };
        value = match value.checked_mul(radix) {
            Some(v) => match v.checked_add(digit) {
                Some(v) => v,
                None => panic!("PULP_FIBERS_STACK_SIZE overflows usize"),
            },
            None => panic!("PULP_FIBERS_STACK_SIZE overflows usize"),
        };
        i += 1;
    }

    if value == 0 {
        panic!("PULP_FIBERS_STACK_SIZE must be non-zero");
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_and_hex() {
        assert_eq!(parse_stack_size("4096"), 4096);
        assert_eq!(parse_stack_size("16_384"), 16384);
        assert_eq!(parse_stack_size("0x2000"), 0x2000);
        assert_eq!(parse_stack_size("0XfF"), 255);
    }

    #[test]
    #[should_panic(expected = "not a number")]
    fn rejects_garbage() {
        parse_stack_size("4k");
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn rejects_zero() {
        parse_stack_size("0");
    }

    #[test]
    fn default_is_usable() {
        assert!(DEFAULT_STACK_SIZE > 0);
    }
}

// Stack image geometry of every backend
//
// Kept free of asm and target crates so host tests pin the bare-metal
// layouts too. Slot indices are words above the saved sp.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub word: usize,
    pub stack_align: usize,
    pub context_words: usize,
    pub boot_words: usize,
    /// Return address inside the saved image.
    pub resume_slot: usize,
    /// Entry fn a bootstrapped fiber's trampoline picks up.
    pub entry_slot: usize,
}

impl Geometry {
    pub const fn frame_bytes(&self) -> usize {
        self.context_words * self.word
    }

    pub const fn boot_bytes(&self) -> usize {
        self.boot_words * self.word
    }

    pub const fn reserve(&self) -> usize {
        self.frame_bytes() + self.boot_bytes()
    }

    /// Both regions keep sp aligned, the return address sits in the
    /// frame and the entry fn is the lowest boot word.
    pub const fn is_consistent(&self) -> bool {
        self.stack_align.is_power_of_two()
            && self.stack_align >= 2 * self.word
            && self.frame_bytes() % self.stack_align == 0
            && self.boot_bytes() % self.stack_align == 0
            && self.resume_slot < self.context_words
            && self.entry_slot == self.context_words
    }
}

/// Armv6-M: r8-r11, r3 (padding), r4-r7, lr; entry fn then padding.
pub const ARMV6M: Geometry = Geometry {
    word: 4,
    stack_align: 8,
    context_words: 10,
    boot_words: 2,
    resume_slot: 9,
    entry_slot: 10,
};

/// RV32 ilp32: s0-s11, ra at +48, three pad words; 16-byte boot slot.
pub const RV32: Geometry = Geometry {
    word: 4,
    stack_align: 16,
    context_words: 16,
    boot_words: 4,
    resume_slot: 12,
    entry_slot: 16,
};

/// x86_64 SysV: rax (padding), r15-r12, rbx, rbp, return address.
pub const X86_64: Geometry = Geometry {
    word: 8,
    stack_align: 16,
    context_words: 8,
    boot_words: 2,
    resume_slot: 7,
    entry_slot: 8,
};

/// AArch64: x19-x28, fp, lr at +88, d8-d15.
pub const AARCH64: Geometry = Geometry {
    word: 8,
    stack_align: 16,
    context_words: 20,
    boot_words: 2,
    resume_slot: 11,
    entry_slot: 20,
};

const _: () = assert!(ARMV6M.is_consistent());
const _: () = assert!(RV32.is_consistent());
const _: () = assert!(X86_64.is_consistent());
const _: () = assert!(AARCH64.is_consistent());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn armv6m_image_is_ten_words_with_twelve_word_reserve() {
        assert_eq!(ARMV6M.frame_bytes(), 40);
        assert_eq!(ARMV6M.reserve(), 12 * 4);
        // lr is the last word popped, straight into pc
        assert_eq!(ARMV6M.resume_slot, ARMV6M.context_words - 1);
        assert_eq!(ARMV6M.frame_bytes() % ARMV6M.stack_align, 0);
    }

    #[test]
    fn rv32_frame_is_64_bytes_plus_16_byte_boot_slot() {
        assert_eq!(RV32.frame_bytes(), 64);
        assert_eq!(RV32.boot_bytes(), 16);
        assert_eq!(RV32.resume_slot * RV32.word, 48);
        assert_eq!(RV32.entry_slot * RV32.word, 64);
    }

    #[test]
    fn hosted_images_keep_16_byte_alignment() {
        for g in [X86_64, AARCH64] {
            assert!(g.is_consistent(), "{g:?}");
            assert_eq!(g.reserve() % 16, 0);
        }
        assert_eq!(AARCH64.resume_slot * AARCH64.word, 88);
    }

    #[test]
    fn misplaced_slots_are_rejected() {
        let odd_frame = Geometry { context_words: 9, resume_slot: 8, entry_slot: 9, ..ARMV6M };
        assert!(!odd_frame.is_consistent());

        let resume_outside = Geometry { resume_slot: 10, ..ARMV6M };
        assert!(!resume_outside.is_consistent());

        let entry_gap = Geometry { entry_slot: 17, ..RV32 };
        assert!(!entry_gap.is_consistent());
    }
}

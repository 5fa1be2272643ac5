//! Architecture-isolating accessors over the raw ptrace register
//! snapshot. Only x86_64 Linux is implemented, matching the
//! calibrated target platform; a second architecture would add a
//! sibling module and a `cfg(target_arch = ...)` re-export here
//! instead of threading `#[cfg]` through the decoder.

use libc::user_regs_struct;

/// A single syscall-stop register snapshot, decoupled from the raw
/// platform struct so the decoder never touches `rdi`/`rsi`/... by
/// name.
pub struct RegisterView {
    regs: user_regs_struct,
}

impl RegisterView {
    pub fn new(regs: user_regs_struct) -> RegisterView {
        RegisterView { regs }
    }

    /// The syscall number, captured from the "original return value"
    /// register at entry and preserved through exit.
    pub fn syscall_number(&self) -> i64 {
        self.regs.orig_rax as i64
    }

    /// The six argument registers in ABI order.
    pub fn arg(&self, index: usize) -> u64 {
        match index {
            0 => self.regs.rdi,
            1 => self.regs.rsi,
            2 => self.regs.rdx,
            3 => self.regs.r10,
            4 => self.regs.r8,
            5 => self.regs.r9,
            _ => panic!("syscall argument index out of range: {}", index),
        }
    }

    /// The raw return-value register, reinterpreted as signed so
    /// negative errno values compare correctly against zero.
    pub fn return_value(&self) -> i64 {
        self.regs.rax as i64
    }

    pub fn instruction_pointer(&self) -> u64 {
        self.regs.rip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regs_with(orig_rax: u64, rax: u64, rdi: u64, rsi: u64) -> user_regs_struct {
        let mut r: user_regs_struct = unsafe { std::mem::zeroed() };
        r.orig_rax = orig_rax;
        r.rax = rax;
        r.rdi = rdi;
        r.rsi = rsi;
        r
    }

    #[test]
    fn exposes_syscall_number_and_args() {
        let view = RegisterView::new(regs_with(9, 0x1000, 0, 65536));
        assert_eq!(view.syscall_number(), 9);
        assert_eq!(view.arg(1), 65536);
    }

    #[test]
    fn return_value_is_signed() {
        let view = RegisterView::new(regs_with(2, (-1i64) as u64, 0, 0));
        assert_eq!(view.return_value(), -1);
    }
}

use core::arch::global_asm;
use core::mem::offset_of;
use foundation::ArchContext;

/// Callee-saved state of a suspended thread under AAPCS64.
///
/// `x19` doubles as the start-routine slot of a fresh context.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct Context {
    sp: usize,
    pc: usize,
    x19_x28: [usize; 10],
    fp: usize,
    lr: usize,
    d8_d15: [u64; 8],
}

const _: () = {
    assert!(offset_of!(Context, sp) == 0);
    assert!(offset_of!(Context, pc) == 8);
    assert!(offset_of!(Context, x19_x28) == 16);
    assert!(offset_of!(Context, fp) == 96);
    assert!(offset_of!(Context, lr) == 104);
    assert!(offset_of!(Context, d8_d15) == 112);
};

impl ArchContext for Context {
    fn new() -> Self {
        Self::default()
    }

    fn sp(&self) -> usize {
        self.sp
    }

    fn set_sp(&mut self, sp: usize) {
        self.sp = sp;
    }

    fn pc(&self) -> usize {
        self.pc
    }

    fn set_pc(&mut self, pc: usize) {
        self.pc = pc;
    }

    fn start_routine(&self) -> usize {
        self.x19_x28[0]
    }

    fn set_start_routine(&mut self, routine: usize) {
        self.x19_x28[0] = routine;
    }

    fn frame_pointer(&self) -> usize {
        self.fp
    }

    fn set_frame_pointer(&mut self, fp: usize) {
        self.fp = fp;
    }
}

global_asm!(
    ".pushsection .text",
    // uthreads_switch_context(from: x0, to: x1)
    ".global uthreads_switch_context",
    ".type uthreads_switch_context, %function",
    ".p2align 2",
    "uthreads_switch_context:",
    "mov x9, sp",
    "str x9, [x0, #0]",
    "adr x9, .Lswitch_resume",
    "str x9, [x0, #8]",
    "stp x19, x20, [x0, #16]",
    "stp x21, x22, [x0, #32]",
    "stp x23, x24, [x0, #48]",
    "stp x25, x26, [x0, #64]",
    "stp x27, x28, [x0, #80]",
    "stp x29, x30, [x0, #96]",
    "stp d8, d9, [x0, #112]",
    "stp d10, d11, [x0, #128]",
    "stp d12, d13, [x0, #144]",
    "stp d14, d15, [x0, #160]",
    "mov x0, x1",
    "b .Lrestore_entry",
    ".Lswitch_resume:",
    "ret",
    ".size uthreads_switch_context, . - uthreads_switch_context",
    "",
    // uthreads_restore_context(to: x0) -> !
    ".global uthreads_restore_context",
    ".type uthreads_restore_context, %function",
    ".p2align 2",
    "uthreads_restore_context:",
    ".Lrestore_entry:",
    "ldr x9, [x0, #0]",
    "mov sp, x9",
    "ldp x19, x20, [x0, #16]",
    "ldp x21, x22, [x0, #32]",
    "ldp x23, x24, [x0, #48]",
    "ldp x25, x26, [x0, #64]",
    "ldp x27, x28, [x0, #80]",
    "ldp x29, x30, [x0, #96]",
    "ldp d8, d9, [x0, #112]",
    "ldp d10, d11, [x0, #128]",
    "ldp d12, d13, [x0, #144]",
    "ldp d14, d15, [x0, #160]",
    "ldr x9, [x0, #8]",
    "br x9",
    ".size uthreads_restore_context, . - uthreads_restore_context",
    "",
    // First instruction of every fresh thread; sp is 16-byte aligned.
    ".global uthreads_thread_trampoline",
    ".type uthreads_thread_trampoline, %function",
    ".p2align 2",
    "uthreads_thread_trampoline:",
    "mov x29, xzr",
    "mov x30, xzr",
    "blr x19",
    "brk #0x1",
    ".size uthreads_thread_trampoline, . - uthreads_thread_trampoline",
    ".popsection",
);

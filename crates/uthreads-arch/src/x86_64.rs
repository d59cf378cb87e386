use core::arch::global_asm;
use core::mem::offset_of;
use foundation::ArchContext;

const MXCSR_DEFAULT: u32 = 0x1f80;
const FPU_CW_DEFAULT: u16 = 0x037f;

/// Callee-saved state of a suspended thread under the System V ABI.
///
/// `r12` doubles as the start-routine slot of a fresh context: the
/// trampoline calls through it.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct Context {
    rsp: usize,
    r15: usize,
    r14: usize,
    r13: usize,
    r12: usize,
    rbx: usize,
    rbp: usize,
    rip: usize,
    mxcsr: u32,
    fpu_cw: u16,
    _pad: u16,
}

// The assembly below hardcodes these offsets.
const _: () = {
    assert!(offset_of!(Context, rsp) == 0x00);
    assert!(offset_of!(Context, r15) == 0x08);
    assert!(offset_of!(Context, r14) == 0x10);
    assert!(offset_of!(Context, r13) == 0x18);
    assert!(offset_of!(Context, r12) == 0x20);
    assert!(offset_of!(Context, rbx) == 0x28);
    assert!(offset_of!(Context, rbp) == 0x30);
    assert!(offset_of!(Context, rip) == 0x38);
    assert!(offset_of!(Context, mxcsr) == 0x40);
    assert!(offset_of!(Context, fpu_cw) == 0x44);
};

impl Default for Context {
    fn default() -> Self {
        <Self as ArchContext>::new()
    }
}

impl ArchContext for Context {
    fn new() -> Self {
        Self {
            rsp: 0,
            r15: 0,
            r14: 0,
            r13: 0,
            r12: 0,
            rbx: 0,
            rbp: 0,
            rip: 0,
            mxcsr: MXCSR_DEFAULT,
            fpu_cw: FPU_CW_DEFAULT,
            _pad: 0,
        }
    }

    fn sp(&self) -> usize {
        self.rsp
    }

    fn set_sp(&mut self, sp: usize) {
        self.rsp = sp;
    }

    fn pc(&self) -> usize {
        self.rip
    }

    fn set_pc(&mut self, pc: usize) {
        self.rip = pc;
    }

    fn start_routine(&self) -> usize {
        self.r12
    }

    fn set_start_routine(&mut self, routine: usize) {
        self.r12 = routine;
    }

    fn frame_pointer(&self) -> usize {
        self.rbp
    }

    fn set_frame_pointer(&mut self, fp: usize) {
        self.rbp = fp;
    }
}

global_asm!(
    ".pushsection .text",
    // uthreads_switch_context(from: rdi, to: rsi)
    ".global uthreads_switch_context",
    ".type uthreads_switch_context, @function",
    ".p2align 4",
    "uthreads_switch_context:",
    "mov [rdi + 0x00], rsp",
    "mov [rdi + 0x08], r15",
    "mov [rdi + 0x10], r14",
    "mov [rdi + 0x18], r13",
    "mov [rdi + 0x20], r12",
    "mov [rdi + 0x28], rbx",
    "mov [rdi + 0x30], rbp",
    "lea rax, [rip + .Lswitch_resume]",
    "mov [rdi + 0x38], rax",
    "stmxcsr dword ptr [rdi + 0x40]",
    "fnstcw word ptr [rdi + 0x44]",
    "mov rdi, rsi",
    "jmp .Lrestore_entry",
    ".Lswitch_resume:",
    "ret",
    ".size uthreads_switch_context, . - uthreads_switch_context",
    "",
    // uthreads_restore_context(to: rdi) -> !
    ".global uthreads_restore_context",
    ".type uthreads_restore_context, @function",
    ".p2align 4",
    "uthreads_restore_context:",
    ".Lrestore_entry:",
    "mov rsp, [rdi + 0x00]",
    "mov r15, [rdi + 0x08]",
    "mov r14, [rdi + 0x10]",
    "mov r13, [rdi + 0x18]",
    "mov r12, [rdi + 0x20]",
    "mov rbx, [rdi + 0x28]",
    "mov rbp, [rdi + 0x30]",
    "ldmxcsr dword ptr [rdi + 0x40]",
    "fldcw word ptr [rdi + 0x44]",
    "jmp qword ptr [rdi + 0x38]",
    ".size uthreads_restore_context, . - uthreads_restore_context",
    "",
    // First instruction of every fresh thread. rsp is 16-byte aligned here,
    // so the call leaves the callee with the usual misalignment of 8.
    ".global uthreads_thread_trampoline",
    ".type uthreads_thread_trampoline, @function",
    ".p2align 4",
    "uthreads_thread_trampoline:",
    "xor ebp, ebp",
    "call r12",
    "ud2",
    ".size uthreads_thread_trampoline, . - uthreads_thread_trampoline",
    ".popsection",
);

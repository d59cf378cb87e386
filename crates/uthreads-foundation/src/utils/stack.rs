use alloc::boxed::Box;
use alloc::vec;
use core::fmt;
use core::mem;

/// Alignment the target ABI requires of a stack pointer at a call boundary.
#[inline]
pub fn abi_stack_align() -> usize {
    cfg_if::cfg_if! {
        if #[cfg(any(
            target_arch = "riscv32",
            target_arch = "riscv64",
            target_arch = "x86_64",
            target_arch = "aarch64",
            target_arch = "x86",
        ))] {
            let min_align = 16;
        } else if #[cfg(target_arch = "arm")] {
            let min_align = 8;
        } else {
            let min_align = 2 * mem::size_of::<usize>();
        }
    }
    min_align
}

/// Fixed-size stack owned by exactly one thread control block.
///
/// The buffer is released when the value is dropped. Cloning copies the bytes
/// into a fresh allocation, so every clone owns an independent stack.
#[derive(Clone)]
pub struct ThreadStack {
    buf: Box<[u8]>,
}

impl ThreadStack {
    pub fn new(size: usize) -> Self {
        Self {
            buf: vec![0u8; size].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn base(&self) -> usize {
        self.buf.as_ptr() as usize
    }

    /// Highest ABI-aligned address at or below the end of the buffer.
    #[inline]
    pub fn top(&self) -> usize {
        (self.base() + self.len()) & !(abi_stack_align() - 1)
    }

    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base() && addr < self.base() + self.len()
    }

    /// Writes `words` at the top of the stack, lowest index at the lowest
    /// address, and returns the resulting ABI-aligned stack pointer.
    ///
    /// # Panics
    /// Panics if the words do not fit in the buffer.
    pub fn prime(&mut self, words: &[usize]) -> usize {
        let word = mem::size_of::<usize>();
        let bytes = words.len() * word;
        let sp = self
            .top()
            .checked_sub(bytes)
            .map(|sp| sp & !(abi_stack_align() - 1))
            .filter(|sp| *sp >= self.base())
            .expect("stack too small for initial frame");

        let offset = sp - self.base();
        for (i, value) in words.iter().enumerate() {
            let at = offset + i * word;
            self.buf[at..at + word].copy_from_slice(&value.to_ne_bytes());
        }
        sp
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl fmt::Debug for ThreadStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadStack")
            .field("base", &format_args!("{:#x}", self.base()))
            .field("len", &self.len())
            .finish()
    }
}

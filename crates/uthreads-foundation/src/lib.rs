#![no_std]

extern crate alloc;

pub mod arch;
pub mod utils;

pub use arch::ArchContext;

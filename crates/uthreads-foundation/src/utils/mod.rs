pub mod global;
pub mod id_bitmap;
pub mod stack;

pub use global::{GlobalCell, GlobalOption};
pub use id_bitmap::IdBitmap;
pub use stack::ThreadStack;

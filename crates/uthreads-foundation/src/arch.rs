/// Register snapshot of a suspended logical thread, as seen by the scheduler.
/// The actual struct layout is owned by the arch crate; only the fields needed
/// to prime a fresh thread are exposed here.
pub trait ArchContext: Clone + Copy + Sized {
    fn new() -> Self;

    fn sp(&self) -> usize;
    fn set_sp(&mut self, sp: usize);

    fn pc(&self) -> usize;
    fn set_pc(&mut self, pc: usize);

    /// Routine the trampoline calls the first time the context is resumed.
    fn start_routine(&self) -> usize;
    fn set_start_routine(&mut self, routine: usize);

    fn frame_pointer(&self) -> usize {
        0
    }
    fn set_frame_pointer(&mut self, _fp: usize) {}
}

pub mod barrier;
pub mod command_buffer;
pub mod immediate;
pub mod semaphore;

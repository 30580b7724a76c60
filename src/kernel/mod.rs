//! From bound expression trees to an OpenCL program.
//!
//! [`schedule`] splits the statements into passes and binds them,
//! [`emit`] renders each pass as a kernel, and [`cache`] names programs
//! and remembers which ones a context has already built.

pub mod cache;
pub mod emit;
pub mod schedule;


pub use cache::{program_name, ProgramCache};
pub use emit::{emit_program, pass_arguments, EmittedProgram, KernelInfo};
pub use schedule::{schedule, Pass, PassKind, Plan};

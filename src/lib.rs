//! Symbolic linear-algebra expressions compiled to OpenCL kernels.
//!
//! Statements over vectors, matrices and scalars are parsed, lowered to
//! expression trees, bound to deduplicated buffer records and emitted as
//! one OpenCL program per statement set.

pub mod api;
pub mod config;
pub mod device;
pub mod diagnostic;
pub mod kernel;
pub mod lower;
pub mod symbolic;
pub mod syntax;

pub use syntax::span;

pub use api::*;
pub use config::GeneratorConfig;
pub use device::DeviceInfo;
pub use diagnostic::Diagnostic;
pub use kernel::ProgramCache;

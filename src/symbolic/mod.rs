//! Symbolic expression trees for OpenCL kernel generation.
//!
//! Trees are built bottom-up from [`KernelArgument`] leaves, bound once
//! against a [`SharedInfoRegistry`] (which collapses repeated references to
//! one buffer into one kernel parameter), then asked for inline code and
//! canonical identities.

pub mod arg;
pub mod error;
pub mod info;
pub mod local;
pub mod node;
pub mod op;
pub mod product;
pub mod scalar;
pub mod traverse;


pub use arg::{ArgKind, Handle, KernelArgument, MatrixLayout, MatrixParams, VectorView};
pub use error::{Result, SymbolicError};
pub use info::{BindingMaps, InfoId, SharedInfo, SharedInfoRegistry};
pub use local::{LocalMemory, LocalMemory2};
pub use node::{BinaryNode, Capabilities, Node, UnaryNode, ValueCategory};
pub use op::{BinaryOp, UnaryOp};
pub use product::{InnerProductNode, ProductNode};
pub use scalar::{Alignment, ScalarType};
pub use traverse::{count_type, extract_as, node_less, NodeKind, NodeSet};

//! Work-group local memory buffers used by reductions and tiled products.

use super::op::BinaryOp;
use super::scalar::ScalarType;

/// A one-dimensional `__local` array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalMemory {
    name: String,
    size: u32,
    scalar: ScalarType,
}

impl LocalMemory {
    pub fn new(name: impl Into<String>, size: u32, scalar: ScalarType) -> Self {
        Self {
            name: name.into(),
            size,
            scalar,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// `__local float buf[128];`
    pub fn declare(&self) -> String {
        format!("__local {} {}[{}];", self.scalar, self.name, self.size)
    }

    pub fn access(&self, index: &str) -> String {
        format!("{}[{}]", self.name, index)
    }

    /// Tree reduction of the buffer into element 0, combining with `op`.
    /// `lid` names the local work-item id; the size must be a power of two.
    pub fn reduction(&self, op: BinaryOp, lid: &str) -> Vec<String> {
        let own = self.access(lid);
        let partner = self.access(&format!("{}+stride", lid));
        vec![
            format!(
                "for (unsigned int stride = {}/2; stride > 0; stride /= 2) {{",
                self.size
            ),
            "    barrier(CLK_LOCAL_MEM_FENCE);".to_string(),
            format!("    if ({} < stride)", lid),
            format!("        {} = {};", own, op.generate(&own, &partner)),
            "}".to_string(),
        ]
    }
}

/// A row-major 2-D `__local` tile, stored as one flat array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalMemory2 {
    size1: u32,
    size2: u32,
    flat: LocalMemory,
}

impl LocalMemory2 {
    pub fn new(name: impl Into<String>, size1: u32, size2: u32, scalar: ScalarType) -> Self {
        Self {
            size1,
            size2,
            flat: LocalMemory::new(name, size1 * size2, scalar),
        }
    }

    pub fn name(&self) -> &str {
        self.flat.name()
    }

    pub fn size1(&self) -> u32 {
        self.size1
    }

    pub fn size2(&self) -> u32 {
        self.size2
    }

    pub fn declare(&self) -> String {
        self.flat.declare()
    }

    /// Element `(i, j)`: `name[(i)*size2+(j)]`.
    pub fn access(&self, i: &str, j: &str) -> String {
        self.flat.access(&format!("({})*{}+({})", i, self.size2, j))
    }
}

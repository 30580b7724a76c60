use std::fmt;

use super::error::{Result, SymbolicError};

/// Element type of a GPU operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Float,
    Double,
    Int,
    Uint,
}

impl ScalarType {
    /// OpenCL C spelling of the type.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Float => "float",
            ScalarType::Double => "double",
            ScalarType::Int => "int",
            ScalarType::Uint => "uint",
        }
    }

    /// Size of one element in bytes.
    pub fn size_bytes(&self) -> u32 {
        match self {
            ScalarType::Double => 8,
            ScalarType::Float | ScalarType::Int | ScalarType::Uint => 4,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "float" => Some(ScalarType::Float),
            "double" => Some(ScalarType::Double),
            "int" => Some(ScalarType::Int),
            "uint" => Some(ScalarType::Uint),
            _ => None,
        }
    }

    /// Whether the type needs `cl_khr_fp64` on the device.
    pub fn needs_double(&self) -> bool {
        matches!(self, ScalarType::Double)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ScalarType::Float | ScalarType::Double)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Vector width used for wide loads of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Alignment(u32);

impl Alignment {
    pub const SCALAR: Alignment = Alignment(1);

    /// Validate an alignment. Only 1, 2, 4, 8 and 16 are representable
    /// as OpenCL vector types.
    pub fn new(value: u32) -> Result<Self> {
        match value {
            1 | 2 | 4 | 8 | 16 => Ok(Alignment(value)),
            _ => Err(SymbolicError::InvalidAlignment(value)),
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Declared element type for this width: `float` at 1, `float4` at 4.
    pub fn vector_type(self, scalar: ScalarType) -> String {
        if self.0 == 1 {
            scalar.name().to_string()
        } else {
            format!("{}{}", scalar.name(), self.0)
        }
    }
}

impl Default for Alignment {
    fn default() -> Self {
        Alignment::SCALAR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_names_round_trip() {
        for ty in [
            ScalarType::Float,
            ScalarType::Double,
            ScalarType::Int,
            ScalarType::Uint,
        ] {
            assert_eq!(ScalarType::from_name(ty.name()), Some(ty));
        }
        assert_eq!(ScalarType::from_name("half"), None);
    }

    #[test]
    fn test_scalar_sizes() {
        assert_eq!(ScalarType::Float.size_bytes(), 4);
        assert_eq!(ScalarType::Double.size_bytes(), 8);
        assert!(ScalarType::Double.needs_double());
        assert!(!ScalarType::Float.needs_double());
    }

    #[test]
    fn test_valid_alignments() {
        for v in [1, 2, 4, 8, 16] {
            assert_eq!(Alignment::new(v).unwrap().get(), v);
        }
    }

    #[test]
    fn test_invalid_alignments() {
        for v in [0, 3, 5, 32] {
            assert_eq!(Alignment::new(v), Err(SymbolicError::InvalidAlignment(v)));
        }
    }

    #[test]
    fn test_vector_type() {
        assert_eq!(Alignment::SCALAR.vector_type(ScalarType::Float), "float");
        let four = Alignment::new(4).unwrap();
        assert_eq!(four.vector_type(ScalarType::Float), "float4");
        assert_eq!(four.vector_type(ScalarType::Double), "double4");
    }
}

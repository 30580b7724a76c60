//! Kernel-argument leaves: one node per reference to a GPU memory object.

use std::fmt;

use super::error::{Result, SymbolicError};
use super::info::{BindingMaps, InfoId, SharedInfo, SharedInfoRegistry};
use super::node::ValueCategory;
use super::scalar::{Alignment, ScalarType};

/// Loop variable that element accesses are written against.
pub const ROW_INDEX: &str = "i";
/// Second loop variable for 2-D (matrix) element accesses.
pub const COL_INDEX: &str = "j";

/// Identity of a memory object. Two leaves are the same argument iff their
/// handles are equal.
///
/// Caller buffers (a device address or any other caller-chosen unique key)
/// and temporaries allocated during scheduling live in separate namespaces,
/// so no caller key can alias a temporary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Handle {
    Buffer(u64),
    Temporary(u32),
}

impl Handle {
    pub fn is_temporary(&self) -> bool {
        matches!(self, Handle::Temporary(_))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Buffer(key) => write!(f, "{:#x}", key),
            Handle::Temporary(n) => write!(f, "tmp{}", n),
        }
    }
}

/// Constant start/stride of a vector view into its buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VectorView {
    pub start: u32,
    pub stride: u32,
}

impl Default for VectorView {
    fn default() -> Self {
        Self {
            start: 0,
            stride: 1,
        }
    }
}

impl VectorView {
    pub fn new(start: u32, stride: u32) -> Self {
        Self { start, stride }
    }

    pub fn is_contiguous(&self) -> bool {
        self.start == 0 && self.stride == 1
    }

    /// Buffer index of logical element `index`: `index*stride+start`.
    pub fn index(&self, index: &str) -> String {
        match (self.stride, self.start) {
            (1, 0) => index.to_string(),
            (1, start) => format!("{}+{}", index, start),
            (stride, 0) => format!("{}*{}", index, stride),
            (stride, start) => format!("{}*{}+{}", index, stride, start),
        }
    }
}

/// Storage order and logical transposition of a matrix operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatrixLayout {
    pub row_major: bool,
    pub transposed: bool,
}

impl Default for MatrixLayout {
    fn default() -> Self {
        Self {
            row_major: true,
            transposed: false,
        }
    }
}

/// The four leaf kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    HostScalar,
    DeviceScalar,
    Vector(VectorView),
    Matrix(MatrixLayout),
}

impl ArgKind {
    pub fn category(&self) -> ValueCategory {
        match self {
            ArgKind::HostScalar | ArgKind::DeviceScalar => ValueCategory::Scalar,
            ArgKind::Vector(_) => ValueCategory::Vector,
            ArgKind::Matrix(_) => ValueCategory::Matrix,
        }
    }

    /// Whether the operand can appear on the left of an assignment.
    pub fn is_writeable(&self) -> bool {
        !matches!(self, ArgKind::HostScalar)
    }

    /// Buffer-level signature: the part of the kind every leaf of one
    /// buffer must agree on.
    fn signature(&self) -> String {
        match self {
            ArgKind::HostScalar => "hscal".to_string(),
            ArgKind::DeviceScalar => "gscal".to_string(),
            ArgKind::Vector(view) => format!("vec s{}o{}", view.stride, view.start),
            ArgKind::Matrix(layout) => format!(
                "mat {}{}",
                if layout.row_major { "row" } else { "col" },
                if layout.transposed { " trans" } else { "" }
            ),
        }
    }
}

/// Names of the scalar parameters that describe a matrix operand.
pub struct MatrixParams<'a> {
    name: &'a str,
}

impl<'a> MatrixParams<'a> {
    pub fn new(name: &'a str) -> Self {
        Self { name }
    }

    pub fn row_start(&self) -> String {
        format!("{}_row_start", self.name)
    }

    pub fn col_start(&self) -> String {
        format!("{}_col_start", self.name)
    }

    pub fn row_inc(&self) -> String {
        format!("{}_row_inc", self.name)
    }

    pub fn col_inc(&self) -> String {
        format!("{}_col_inc", self.name)
    }

    pub fn internal_size1(&self) -> String {
        format!("{}_internal_size1", self.name)
    }

    pub fn internal_size2(&self) -> String {
        format!("{}_internal_size2", self.name)
    }

    /// Buffer offset of logical element `(i, j)`.
    ///
    /// Transposition swaps which index walks rows; the storage order picks
    /// which dimension is contiguous. The two are independent.
    pub fn offset(&self, layout: MatrixLayout, i: &str, j: &str) -> String {
        let (i, j) = if layout.transposed { (j, i) } else { (i, j) };
        let row = format!("({})*{}+{}", i, self.row_inc(), self.row_start());
        let col = format!("({})*{}+{}", j, self.col_inc(), self.col_start());
        if layout.row_major {
            format!("({})*{}+({})", row, self.internal_size2(), col)
        } else {
            format!("({})+({})*{}", row, col, self.internal_size1())
        }
    }

    /// Loop condition keeping logical row `index` inside the buffer.
    pub fn rows_bound(&self, layout: MatrixLayout, index: &str) -> String {
        if layout.transposed {
            format!("{}*{}+{} < {}", index, self.col_inc(), self.col_start(), self.internal_size2())
        } else {
            format!("{}*{}+{} < {}", index, self.row_inc(), self.row_start(), self.internal_size1())
        }
    }

    /// Loop condition keeping logical column `index` inside the buffer.
    pub fn cols_bound(&self, layout: MatrixLayout, index: &str) -> String {
        if layout.transposed {
            format!("{}*{}+{} < {}", index, self.row_inc(), self.row_start(), self.internal_size1())
        } else {
            format!("{}*{}+{} < {}", index, self.col_inc(), self.col_start(), self.internal_size2())
        }
    }
}

/// Name of the size parameter declared with a vector buffer.
pub fn vector_size(name: &str) -> String {
    format!("{}_size", name)
}

/// A leaf referring to one GPU memory object.
#[derive(Clone, Debug)]
pub struct KernelArgument {
    handle: Handle,
    scalar: ScalarType,
    kind: ArgKind,
    info: Option<InfoId>,
}

impl KernelArgument {
    pub fn new(handle: Handle, scalar: ScalarType, kind: ArgKind) -> Self {
        Self {
            handle,
            scalar,
            kind,
            info: None,
        }
    }

    pub fn host_scalar(handle: Handle, scalar: ScalarType) -> Self {
        Self::new(handle, scalar, ArgKind::HostScalar)
    }

    pub fn device_scalar(handle: Handle, scalar: ScalarType) -> Self {
        Self::new(handle, scalar, ArgKind::DeviceScalar)
    }

    pub fn vector(handle: Handle, scalar: ScalarType) -> Self {
        Self::new(handle, scalar, ArgKind::Vector(VectorView::default()))
    }

    pub fn vector_view(handle: Handle, scalar: ScalarType, view: VectorView) -> Self {
        Self::new(handle, scalar, ArgKind::Vector(view))
    }

    pub fn matrix(handle: Handle, scalar: ScalarType, layout: MatrixLayout) -> Self {
        Self::new(handle, scalar, ArgKind::Matrix(layout))
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.scalar
    }

    pub fn kind(&self) -> ArgKind {
        self.kind
    }

    pub fn category(&self) -> ValueCategory {
        self.kind.category()
    }

    pub fn is_bound(&self) -> bool {
        self.info.is_some()
    }

    /// Registry key, available once `bind` has run.
    pub fn info_id(&self) -> Result<InfoId> {
        self.info.ok_or(SymbolicError::Unbound)
    }

    pub fn info<'r>(&self, reg: &'r SharedInfoRegistry) -> Result<&'r SharedInfo> {
        reg.get(self.info_id()?)
    }

    pub fn name<'r>(&self, reg: &'r SharedInfoRegistry) -> Result<&'r str> {
        Ok(self.info(reg)?.name())
    }

    pub fn alignment(&self, reg: &SharedInfoRegistry) -> Result<Alignment> {
        Ok(self.info(reg)?.alignment())
    }

    /// Raise the vector width of the underlying buffer.
    pub fn set_alignment(&self, reg: &mut SharedInfoRegistry, value: u32) -> Result<()> {
        let alignment = Alignment::new(value)?;
        let id = self.info_id()?;
        reg.get_mut(id)?.raise_alignment(alignment);
        Ok(())
    }

    /// Declared element type, widened by the buffer's alignment.
    pub fn aligned_scalartype(&self, reg: &SharedInfoRegistry) -> Result<String> {
        let info = self.info(reg)?;
        Ok(info.alignment().vector_type(info.scalartype()))
    }

    pub fn access_name<'r>(&self, reg: &'r SharedInfoRegistry, pass: usize) -> Result<&'r str> {
        self.info(reg)?.access_name(pass)
    }

    /// Override how the buffer is reached inside kernel `pass`.
    pub fn set_access_name(
        &self,
        reg: &mut SharedInfoRegistry,
        pass: usize,
        name: impl Into<String>,
    ) -> Result<()> {
        let id = self.info_id()?;
        reg.get_mut(id)?.set_access_name(pass, name.into());
        Ok(())
    }

    /// Declaration text of this argument in a kernel signature.
    pub fn arguments_string(&self, reg: &SharedInfoRegistry) -> Result<String> {
        let name = self.name(reg)?;
        Ok(match self.kind {
            ArgKind::HostScalar => format!("{} {}", self.scalar.name(), name),
            ArgKind::DeviceScalar => format!("__global {}* {}", self.scalar.name(), name),
            ArgKind::Vector(_) => format!(
                "__global {}* {}, unsigned int {}",
                self.aligned_scalartype(reg)?,
                name,
                vector_size(name)
            ),
            ArgKind::Matrix(_) => {
                let params = MatrixParams::new(name);
                format!(
                    "__global {}* {}, unsigned int {}, unsigned int {}, unsigned int {}, unsigned int {}, unsigned int {}, unsigned int {}",
                    self.aligned_scalartype(reg)?,
                    name,
                    params.row_start(),
                    params.col_start(),
                    params.row_inc(),
                    params.col_inc(),
                    params.internal_size1(),
                    params.internal_size2()
                )
            }
        })
    }

    /// Element access of a vector leaf at logical index `index`.
    pub fn vector_element(&self, reg: &SharedInfoRegistry, index: &str) -> Result<String> {
        let name = self.name(reg)?;
        match self.kind {
            ArgKind::Vector(view) => Ok(format!("{}[{}]", name, view.index(index))),
            _ => Err(self.kind_mismatch("vector")),
        }
    }

    /// Element access of a matrix leaf at logical position `(i, j)`.
    pub fn matrix_element(&self, reg: &SharedInfoRegistry, i: &str, j: &str) -> Result<String> {
        let name = self.name(reg)?;
        match self.kind {
            ArgKind::Matrix(layout) => Ok(format!(
                "{}[{}]",
                name,
                MatrixParams::new(name).offset(layout, i, j)
            )),
            _ => Err(self.kind_mismatch("matrix")),
        }
    }

    fn kind_mismatch(&self, expected: &str) -> SymbolicError {
        SymbolicError::TypeMismatch {
            op: "element access".to_string(),
            lhs: self.category().to_string(),
            rhs: expected.to_string(),
        }
    }

    /// Access used when no override is recorded for a kernel.
    fn default_access(&self, name: &str) -> String {
        match self.kind {
            ArgKind::HostScalar => name.to_string(),
            ArgKind::DeviceScalar => format!("{}[0]", name),
            ArgKind::Vector(view) => format!("{}[{}]", name, view.index(ROW_INDEX)),
            ArgKind::Matrix(layout) => format!(
                "{}[{}]",
                name,
                MatrixParams::new(name).offset(layout, ROW_INDEX, COL_INDEX)
            ),
        }
    }

    pub fn repr(&self, reg: &SharedInfoRegistry) -> Result<String> {
        let info = self.info(reg)?;
        let id = info.id();
        let ty = info.scalartype();
        Ok(match self.kind {
            ArgKind::HostScalar => format!("hscal_{}_{}", ty, id),
            ArgKind::DeviceScalar => format!("gscal_{}_{}", ty, id),
            ArgKind::Vector(view) => {
                let mut repr = format!("vec_{}_{}", info.alignment().vector_type(ty), id);
                if !view.is_contiguous() {
                    repr.push_str(&format!("_s{}o{}", view.stride, view.start));
                }
                repr
            }
            ArgKind::Matrix(layout) => format!(
                "mat_{}{}_{}_{}",
                if layout.row_major { "row" } else { "col" },
                if layout.transposed { "_t" } else { "" },
                info.alignment().vector_type(ty),
                id
            ),
        })
    }

    /// Register the buffer (or find its existing record) and record the
    /// default access name for the current pass. Existing names are kept.
    pub fn bind(&mut self, reg: &mut SharedInfoRegistry, maps: &BindingMaps) -> Result<()> {
        let id = reg.register(self.handle, self.scalar, &self.kind.signature())?;
        self.info = Some(id);

        let pass = maps.pass();
        let info = reg.get_mut(id)?;
        if !info.has_access_name(pass) {
            let access = self.default_access(info.name());
            tracing::trace!(pass, access = access.as_str(), "default access name");
            info.set_access_name(pass, access);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(mut arg: KernelArgument, reg: &mut SharedInfoRegistry) -> KernelArgument {
        arg.bind(reg, &BindingMaps::new()).unwrap();
        arg
    }

    #[test]
    fn test_unbound_access_is_rejected() {
        let reg = SharedInfoRegistry::new();
        let x = KernelArgument::vector(Handle::Buffer(1), ScalarType::Float);
        assert_eq!(x.name(&reg), Err(SymbolicError::Unbound));
        assert_eq!(x.access_name(&reg, 0), Err(SymbolicError::Unbound));
        assert_eq!(x.arguments_string(&reg), Err(SymbolicError::Unbound));
    }

    #[test]
    fn test_host_and_device_scalar_signatures() {
        let mut reg = SharedInfoRegistry::new();
        let a = bound(KernelArgument::host_scalar(Handle::Buffer(1), ScalarType::Float), &mut reg);
        let s = bound(KernelArgument::device_scalar(Handle::Buffer(2), ScalarType::Double), &mut reg);
        assert_eq!(a.arguments_string(&reg).unwrap(), "float arg0");
        assert_eq!(s.arguments_string(&reg).unwrap(), "__global double* arg1");
        assert_eq!(a.access_name(&reg, 0).unwrap(), "arg0");
        assert_eq!(s.access_name(&reg, 0).unwrap(), "arg1[0]");
    }

    #[test]
    fn test_vector_signature_and_alignment() {
        let mut reg = SharedInfoRegistry::new();
        let x = bound(KernelArgument::vector(Handle::Buffer(7), ScalarType::Float), &mut reg);
        assert_eq!(
            x.arguments_string(&reg).unwrap(),
            "__global float* arg0, unsigned int arg0_size"
        );
        x.set_alignment(&mut reg, 4).unwrap();
        assert_eq!(x.aligned_scalartype(&reg).unwrap(), "float4");
        assert_eq!(
            x.arguments_string(&reg).unwrap(),
            "__global float4* arg0, unsigned int arg0_size"
        );
        assert_eq!(
            x.set_alignment(&mut reg, 3),
            Err(SymbolicError::InvalidAlignment(3))
        );
        assert_eq!(
            x.set_alignment(&mut reg, 0),
            Err(SymbolicError::InvalidAlignment(0))
        );
        assert_eq!(x.alignment(&reg).unwrap().get(), 4);
    }

    #[test]
    fn test_vector_view_addressing() {
        assert_eq!(VectorView::default().index("i"), "i");
        assert_eq!(VectorView::new(3, 1).index("i"), "i+3");
        assert_eq!(VectorView::new(0, 2).index("i"), "i*2");
        assert_eq!(VectorView::new(1, 2).index("k"), "k*2+1");

        let mut reg = SharedInfoRegistry::new();
        let x = bound(
            KernelArgument::vector_view(Handle::Buffer(1), ScalarType::Float, VectorView::new(1, 2)),
            &mut reg,
        );
        assert_eq!(x.access_name(&reg, 0).unwrap(), "arg0[i*2+1]");
        assert_eq!(x.vector_element(&reg, "k").unwrap(), "arg0[k*2+1]");
        assert_eq!(x.repr(&reg).unwrap(), "vec_float_0_s2o1");
    }

    #[test]
    fn test_matrix_signature() {
        let mut reg = SharedInfoRegistry::new();
        let a = bound(
            KernelArgument::matrix(Handle::Buffer(1), ScalarType::Float, MatrixLayout::default()),
            &mut reg,
        );
        assert_eq!(
            a.arguments_string(&reg).unwrap(),
            "__global float* arg0, unsigned int arg0_row_start, unsigned int arg0_col_start, \
             unsigned int arg0_row_inc, unsigned int arg0_col_inc, \
             unsigned int arg0_internal_size1, unsigned int arg0_internal_size2"
        );
    }

    #[test]
    fn test_matrix_offsets() {
        let params = MatrixParams::new("A");
        let row = MatrixLayout {
            row_major: true,
            transposed: false,
        };
        let col = MatrixLayout {
            row_major: false,
            transposed: false,
        };
        let row_t = MatrixLayout {
            row_major: true,
            transposed: true,
        };
        assert_eq!(
            params.offset(row, "i", "j"),
            "((i)*A_row_inc+A_row_start)*A_internal_size2+((j)*A_col_inc+A_col_start)"
        );
        assert_eq!(
            params.offset(col, "i", "j"),
            "((i)*A_row_inc+A_row_start)+((j)*A_col_inc+A_col_start)*A_internal_size1"
        );
        // Transposition swaps the index roles, not the storage order.
        assert_eq!(params.offset(row_t, "i", "j"), params.offset(row, "j", "i"));
    }

    #[test]
    fn test_reprs_by_kind() {
        let mut reg = SharedInfoRegistry::new();
        let a = bound(KernelArgument::host_scalar(Handle::Buffer(1), ScalarType::Float), &mut reg);
        let s = bound(KernelArgument::device_scalar(Handle::Buffer(2), ScalarType::Float), &mut reg);
        let m = bound(
            KernelArgument::matrix(
                Handle::Buffer(3),
                ScalarType::Double,
                MatrixLayout {
                    row_major: false,
                    transposed: true,
                },
            ),
            &mut reg,
        );
        assert_eq!(a.repr(&reg).unwrap(), "hscal_float_0");
        assert_eq!(s.repr(&reg).unwrap(), "gscal_float_1");
        assert_eq!(m.repr(&reg).unwrap(), "mat_col_t_double_2");
    }

    #[test]
    fn test_rebind_keeps_access_name() {
        let mut reg = SharedInfoRegistry::new();
        let mut x = bound(KernelArgument::vector(Handle::Buffer(1), ScalarType::Float), &mut reg);
        x.set_access_name(&mut reg, 0, "x_val").unwrap();
        x.bind(&mut reg, &BindingMaps::new()).unwrap();
        assert_eq!(x.access_name(&reg, 0).unwrap(), "x_val");
    }

    #[test]
    fn test_same_buffer_different_view_conflicts() {
        let mut reg = SharedInfoRegistry::new();
        let maps = BindingMaps::new();
        let mut x = KernelArgument::vector(Handle::Buffer(1), ScalarType::Float);
        let mut xs =
            KernelArgument::vector_view(Handle::Buffer(1), ScalarType::Float, VectorView::new(0, 2));
        x.bind(&mut reg, &maps).unwrap();
        assert!(matches!(
            xs.bind(&mut reg, &maps),
            Err(SymbolicError::LayoutConflict { .. })
        ));
    }
}

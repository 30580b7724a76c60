//! Shared-info records and the binding maps of one compilation request.
//!
//! Records live in an arena owned by [`SharedInfoRegistry`]; leaves keep an
//! [`InfoId`] into it. Exactly one record exists per buffer handle, which is
//! what collapses repeated references to one kernel parameter.

use std::collections::{BTreeMap, HashMap};

use super::arg::Handle;
use super::error::{Result, SymbolicError};
use super::scalar::{Alignment, ScalarType};

/// Index of a record in the registry arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InfoId(u32);

impl InfoId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Canonical metadata for one underlying buffer.
#[derive(Clone, Debug)]
pub struct SharedInfo {
    id: u32,
    name: String,
    scalar: ScalarType,
    alignment: Alignment,
    /// Kernel index → name used to reach this buffer inside that kernel.
    access_names: BTreeMap<usize, String>,
    /// Kind and layout of the first leaf bound to the buffer.
    signature: String,
}

impl SharedInfo {
    fn new(id: u32, scalar: ScalarType, signature: String) -> Self {
        Self {
            id,
            name: format!("arg{}", id),
            scalar,
            alignment: Alignment::SCALAR,
            access_names: BTreeMap::new(),
            signature,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Generated kernel parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scalartype(&self) -> ScalarType {
        self.scalar
    }

    pub fn scalartype_size(&self) -> u32 {
        self.scalar.size_bytes()
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Raise the vector width. Requests below the current width are ignored.
    pub fn raise_alignment(&mut self, alignment: Alignment) {
        if alignment > self.alignment {
            self.alignment = alignment;
        }
    }

    pub fn access_name(&self, pass: usize) -> Result<&str> {
        self.access_names
            .get(&pass)
            .map(String::as_str)
            .ok_or_else(|| SymbolicError::UnsetAccessName {
                name: self.name.clone(),
                pass,
            })
    }

    pub fn set_access_name(&mut self, pass: usize, name: String) {
        self.access_names.insert(pass, name);
    }

    pub fn has_access_name(&self, pass: usize) -> bool {
        self.access_names.contains_key(&pass)
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }
}

/// The dedup table: buffer handle → shared-info record.
#[derive(Clone, Debug, Default)]
pub struct SharedInfoRegistry {
    infos: Vec<SharedInfo>,
    by_handle: HashMap<Handle, InfoId>,
}

impl SharedInfoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Record for `id`; ids handed out by another registry are unbound here.
    pub fn get(&self, id: InfoId) -> Result<&SharedInfo> {
        self.infos.get(id.index()).ok_or(SymbolicError::Unbound)
    }

    pub fn get_mut(&mut self, id: InfoId) -> Result<&mut SharedInfo> {
        self.infos.get_mut(id.index()).ok_or(SymbolicError::Unbound)
    }

    pub fn lookup(&self, handle: Handle) -> Option<InfoId> {
        self.by_handle.get(&handle).copied()
    }

    /// Find or create the record for `handle`.
    ///
    /// A handle that is already registered must be requested with the same
    /// element type and signature; anything else is a layout conflict.
    pub fn register(
        &mut self,
        handle: Handle,
        scalar: ScalarType,
        signature: &str,
    ) -> Result<InfoId> {
        if let Some(id) = self.lookup(handle) {
            let info = self.get(id)?;
            if info.scalar != scalar || info.signature != signature {
                return Err(SymbolicError::LayoutConflict {
                    handle,
                    existing: format!("{} {}", info.signature, info.scalar),
                    requested: format!("{} {}", signature, scalar),
                });
            }
            tracing::trace!(%handle, name = info.name(), "reusing shared info");
            return Ok(id);
        }

        let id = InfoId(self.infos.len() as u32);
        let info = SharedInfo::new(id.0, scalar, signature.to_string());
        tracing::debug!(%handle, name = info.name(), %scalar, signature, "new shared info");
        self.infos.push(info);
        self.by_handle.insert(handle, id);
        Ok(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedInfo> {
        self.infos.iter()
    }
}

/// Pass-scoped binding state besides the registry.
#[derive(Clone, Debug, Default)]
pub struct BindingMaps {
    pass: usize,
    /// Structural identity of a temporary → its synthetic handle.
    temporaries: BTreeMap<String, Handle>,
}

impl BindingMaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kernel index whose access names `bind` records.
    pub fn pass(&self) -> usize {
        self.pass
    }

    pub fn set_pass(&mut self, pass: usize) {
        self.pass = pass;
    }

    /// Handle of the temporary identified by `key`, allocating one on first
    /// use so structurally identical temporaries share storage.
    pub fn temporary_for(&mut self, key: &str) -> Handle {
        if let Some(handle) = self.temporaries.get(key) {
            return *handle;
        }
        let handle = Handle::Temporary(self.temporaries.len() as u32);
        self.temporaries.insert(key.to_string(), handle);
        handle
    }

    /// Whether `handle` names a temporary rather than an external buffer.
    pub fn is_temporary(&self, handle: Handle) -> bool {
        self.temporaries.values().any(|h| *h == handle)
    }

    pub fn temporary_count(&self) -> usize {
        self.temporaries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_dedups_by_handle() {
        let mut reg = SharedInfoRegistry::new();
        let a = reg.register(Handle::Buffer(10), ScalarType::Float, "vec").unwrap();
        let b = reg.register(Handle::Buffer(10), ScalarType::Float, "vec").unwrap();
        let c = reg.register(Handle::Buffer(11), ScalarType::Float, "vec").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get(a).unwrap().name(), "arg0");
        assert_eq!(reg.get(c).unwrap().name(), "arg1");
    }

    #[test]
    fn test_register_rejects_conflicting_layout() {
        let mut reg = SharedInfoRegistry::new();
        reg.register(Handle::Buffer(1), ScalarType::Float, "vec").unwrap();
        let err = reg.register(Handle::Buffer(1), ScalarType::Double, "vec").unwrap_err();
        assert!(matches!(err, SymbolicError::LayoutConflict { .. }));
        let err = reg.register(Handle::Buffer(1), ScalarType::Float, "gscal").unwrap_err();
        assert!(matches!(err, SymbolicError::LayoutConflict { .. }));
    }

    #[test]
    fn test_access_names_per_pass() {
        let mut reg = SharedInfoRegistry::new();
        let id = reg.register(Handle::Buffer(1), ScalarType::Float, "vec").unwrap();
        assert_eq!(
            reg.get(id).unwrap().access_name(0),
            Err(SymbolicError::UnsetAccessName {
                name: "arg0".to_string(),
                pass: 0
            })
        );
        reg.get_mut(id).unwrap().set_access_name(0, "arg0[i]".to_string());
        reg.get_mut(id).unwrap().set_access_name(1, "x_val".to_string());
        assert_eq!(reg.get(id).unwrap().access_name(0).unwrap(), "arg0[i]");
        assert_eq!(reg.get(id).unwrap().access_name(1).unwrap(), "x_val");
        assert!(!reg.get(id).unwrap().has_access_name(2));
    }

    #[test]
    fn test_alignment_never_lowered() {
        let mut reg = SharedInfoRegistry::new();
        let id = reg.register(Handle::Buffer(1), ScalarType::Float, "vec").unwrap();
        let info = reg.get_mut(id).unwrap();
        assert_eq!(info.alignment().get(), 1);
        info.raise_alignment(Alignment::new(8).unwrap());
        info.raise_alignment(Alignment::new(2).unwrap());
        assert_eq!(info.alignment().get(), 8);
        assert_eq!(info.scalartype_size(), 4);
    }

    #[test]
    fn test_temporaries_are_shared_by_key() {
        let mut maps = BindingMaps::new();
        let a = maps.temporary_for("p_x_mul_y_p");
        let b = maps.temporary_for("p_x_mul_y_p");
        let c = maps.temporary_for("p_x_mul_z_p");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(maps.is_temporary(a));
        assert!(!maps.is_temporary(Handle::Buffer(3)));
        assert_eq!(maps.temporary_count(), 2);
    }
}

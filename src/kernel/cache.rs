//! Program naming and the caller-owned program cache.

use std::collections::HashMap;

/// Stable program name: `{prefix}_{hash}` over the statement reprs and the
/// work-group size, so identical expression sets map to one program.
pub fn program_name(prefix: &str, cache_key: &str, local_size: u32) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(cache_key.as_bytes());
    hasher.update(b"|");
    hasher.update(&local_size.to_le_bytes());
    let hex = hasher.finalize().to_hex();
    format!("{}_{}", prefix, &hex[..16])
}

/// Programs already built, per device context.
///
/// Owned by the caller and passed in explicitly; nothing here is global.
#[derive(Clone, Debug, Default)]
pub struct ProgramCache<T> {
    entries: HashMap<(String, String), T>,
    hits: usize,
    misses: usize,
}

impl<T: Clone> ProgramCache<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up `program` in `context`, counting the hit or miss.
    pub fn get(&mut self, context: &str, program: &str) -> Option<T> {
        match self.entries.get(&(context.to_string(), program.to_string())) {
            Some(entry) => {
                self.hits += 1;
                tracing::debug!(context, program, "program cache hit");
                Some(entry.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, context: &str, program: &str, value: T) {
        self.entries
            .insert((context.to_string(), program.to_string()), value);
    }

    pub fn contains(&self, context: &str, program: &str) -> bool {
        self.entries
            .contains_key(&(context.to_string(), program.to_string()))
    }

    /// Drop every program recorded for `context`.
    pub fn invalidate(&mut self, context: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(ctx, _), _| ctx != context);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_name_is_stable() {
        let a = program_name("symcl", "p_vec_float_0assignvec_float_1_p", 128);
        let b = program_name("symcl", "p_vec_float_0assignvec_float_1_p", 128);
        assert_eq!(a, b);
        assert!(a.starts_with("symcl_"));
        assert_eq!(a.len(), "symcl_".len() + 16);
    }

    #[test]
    fn test_program_name_depends_on_inputs() {
        let base = program_name("symcl", "key", 128);
        assert_ne!(base, program_name("symcl", "other", 128));
        assert_ne!(base, program_name("symcl", "key", 256));
        assert!(program_name("blas", "key", 128).starts_with("blas_"));
    }

    #[test]
    fn test_cache_is_per_context() {
        let mut cache: ProgramCache<String> = ProgramCache::new();
        assert!(cache.get("ctx0", "p").is_none());
        cache.insert("ctx0", "p", "source".to_string());
        assert_eq!(cache.get("ctx0", "p").as_deref(), Some("source"));
        assert!(cache.get("ctx1", "p").is_none());
        assert_eq!((cache.hits(), cache.misses()), (1, 2));

        cache.insert("ctx1", "p", "other".to_string());
        assert_eq!(cache.invalidate("ctx0"), 1);
        assert!(!cache.contains("ctx0", "p"));
        assert!(cache.contains("ctx1", "p"));
        assert_eq!(cache.len(), 1);
    }
}

//! Generator configuration (`symcl.toml`).

use std::path::Path;

use crate::diagnostic::Diagnostic;
use crate::symbolic::{Alignment, ScalarType, SymbolicError};
use crate::syntax::span::Span;

/// File name looked up by [`GeneratorConfig::resolve`].
pub const CONFIG_FILE: &str = "symcl.toml";

/// Knobs for kernel generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Prefix of generated program and kernel names.
    pub prefix: String,
    /// Work-group size of reduction kernels. Always a power of two.
    pub local_size: u32,
    /// Element type of declarations that do not name one.
    pub default_type: ScalarType,
    /// Vector width applied to elementwise programs.
    pub alignment: Alignment,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            prefix: "symcl".to_string(),
            local_size: 128,
            default_type: ScalarType::Float,
            alignment: Alignment::SCALAR,
        }
    }
}

/// Largest work-group size a reduction kernel may request.
pub const MAX_LOCAL_SIZE: u32 = 1024;

impl GeneratorConfig {
    /// Reject a `local_size` the tree reduction cannot halve down to one.
    pub fn check_local_size(&self) -> crate::symbolic::Result<()> {
        if self.local_size.is_power_of_two() && self.local_size <= MAX_LOCAL_SIZE {
            Ok(())
        } else {
            Err(SymbolicError::InvalidLocalSize(self.local_size))
        }
    }

    pub fn load(path: &Path) -> Result<Self, Diagnostic> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Diagnostic::error(
                format!("cannot read config '{}': {}", path.display(), e),
                Span::default(),
            )
        })?;
        Self::parse_toml(&content, path)
    }

    /// Load `symcl.toml` from `dir`, or fall back to the defaults.
    pub fn resolve(dir: &Path) -> Result<Self, Diagnostic> {
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            tracing::debug!(path = %path.display(), "loading generator config");
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self, Diagnostic> {
        let err = |msg: String| {
            Diagnostic::error(format!("{}: {}", path.display(), msg), Span::default())
        };

        let mut config = Self::default();
        let mut section = String::new();

        for (lineno, line) in content.lines().enumerate() {
            let trimmed = strip_comment(line).trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                section = trimmed[1..trimmed.len() - 1].trim().to_string();
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(err(format!("line {}: expected `key = value`", lineno + 1)));
            };
            let key = key.trim();
            let value = value.trim();
            let unquoted = value.trim_matches('"');

            match (section.as_str(), key) {
                ("generator", "prefix") => {
                    if unquoted.is_empty() || !unquoted.chars().all(is_ident_char) {
                        return Err(err(format!("invalid generator.prefix: {}", value))
                            .with_help("use letters, digits and underscores".to_string()));
                    }
                    config.prefix = unquoted.to_string();
                }
                ("generator", "local_size") => {
                    let size: u32 = value
                        .parse()
                        .map_err(|_| err(format!("invalid generator.local_size: {}", value)))?;
                    if !size.is_power_of_two() || size > MAX_LOCAL_SIZE {
                        return Err(err(format!("invalid generator.local_size: {}", value))
                            .with_help("use a power of two no larger than 1024".to_string()));
                    }
                    config.local_size = size;
                }
                ("types", "default") => {
                    config.default_type = ScalarType::from_name(unquoted).ok_or_else(|| {
                        err(format!("unknown element type: {}", value))
                            .with_help("expected float, double, int or uint".to_string())
                    })?;
                }
                ("types", "alignment") => {
                    let n: u32 = value
                        .parse()
                        .map_err(|_| err(format!("invalid types.alignment: {}", value)))?;
                    config.alignment = Alignment::new(n)
                        .map_err(|e| Diagnostic::from_symbolic(&e, Span::default()))?;
                }
                _ => {
                    tracing::warn!(section = section.as_str(), key, "ignoring unknown config key");
                }
            }
        }

        Ok(config)
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

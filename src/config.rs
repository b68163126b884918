use std::path::Path;

use serde::Deserialize;

use crate::diagnostics::LowerError;

/// Build-mode switches that gate the append and zero-assignment fast paths.
/// Read-only for the whole lowering run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildFlags {
    /// Optimizations disabled (`-N`).
    pub no_optimize: bool,
    /// Memory or race instrumentation is active.
    pub instrument: bool,
    /// The runtime package itself is being compiled.
    pub compiling_runtime: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Target {
    /// Width of the machine `int`/`uint` in bits.
    pub int_bits: u8,
    /// Pointer size in bytes.
    pub ptr_size: u8,
}

impl Default for Target {
    fn default() -> Self {
        Self { int_bits: 64, ptr_size: 8 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Map elements up to this size come back by value from presence reads;
    /// larger ones go through the `_fat` primitive with a zero buffer.
    pub zero_val_size: u64,
    /// Map elements above this size always take the generic slow path.
    pub max_fast_elem_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self { zero_val_size: 1024, max_fast_elem_size: 128 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LowerConfig {
    pub flags: BuildFlags,
    pub target: Target,
    pub limits: Limits,
}

impl LowerConfig {
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, LowerError> {
        let config: LowerConfig = toml::from_str(text)
            .map_err(|e| LowerError::config(format!("failed to parse: {e}"), path.to_path_buf()))?;
        config.validate(path)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, LowerError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LowerError::config(format!("failed to read: {e}"), path.to_path_buf()))?;
        Self::from_toml_str(&text, path)
    }

    fn validate(&self, path: &Path) -> Result<(), LowerError> {
        if !matches!(self.target.int_bits, 32 | 64) {
            return Err(LowerError::config(
                format!("target.int_bits must be 32 or 64, got {}", self.target.int_bits),
                path.to_path_buf(),
            ));
        }
        if !matches!(self.target.ptr_size, 4 | 8) {
            return Err(LowerError::config(
                format!("target.ptr_size must be 4 or 8, got {}", self.target.ptr_size),
                path.to_path_buf(),
            ));
        }
        Ok(())
    }

    /// Size in bytes of the machine `int`.
    pub fn int_size(&self) -> u64 {
        u64::from(self.target.int_bits / 8)
    }

    pub fn ptr_size(&self) -> u64 {
        u64::from(self.target.ptr_size)
    }

    /// The append and zero-assignment fast paths are off under instrumentation.
    pub fn instrumenting(&self) -> bool {
        self.flags.instrument
    }
}

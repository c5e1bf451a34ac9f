//! Format registry: runtime format identities and extension lookup.
//!
//! # Identity rules
//! Every built-in format has a [`FormatId`].  File-level operations resolve a
//! path to a `FormatId` through a [`Registry`], either the built-in table or
//! one extended with [`Registry::register`].  Extensions are matched
//! case-insensitively, with the leading dot.
//!
//! Generic code over [`Format`](crate::record::Format) meets runtime
//! `FormatId`s in [`with_format!`], which monomorphises a body once per
//! format.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RecordError, Result};

// ── FormatId enum ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatId {
    Intel,
    Motorola,
    Mos,
    Binary,
}

impl FormatId {
    pub const ALL: [FormatId; 4] = [FormatId::Intel, FormatId::Motorola, FormatId::Mos, FormatId::Binary];

    /// Human-readable name, also accepted by [`FormatId::from_name`].
    pub fn name(self) -> &'static str {
        match self {
            FormatId::Intel    => "intel",
            FormatId::Motorola => "motorola",
            FormatId::Mos      => "mos",
            FormatId::Binary   => "binary",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "intel" | "ihex"          => Some(FormatId::Intel),
            "motorola" | "srec"       => Some(FormatId::Motorola),
            "mos"                     => Some(FormatId::Mos),
            "binary" | "bin" | "raw"  => Some(FormatId::Binary),
            _                         => None,
        }
    }

    /// Extensions registered for this format by default.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            FormatId::Intel    => &[".hex", ".ihex", ".mcs"],
            FormatId::Motorola => &[".mot", ".s19", ".s28", ".s37", ".srec", ".exo"],
            FormatId::Mos      => &[".mos"],
            FormatId::Binary   => &[".bin", ".raw"],
        }
    }
}

impl std::fmt::Display for FormatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for FormatId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown format {s:?}"))
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// Extension-to-format table.
#[derive(Debug, Clone)]
pub struct Registry {
    by_extension: HashMap<String, FormatId>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self { by_extension: HashMap::new() };
        for id in FormatId::ALL {
            for ext in id.extensions() {
                registry.register(ext, id);
            }
        }
        registry
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.to_lowercase();
    if ext.starts_with('.') { ext } else { format!(".{ext}") }
}

impl Registry {
    /// Map `ext` to `id`, returning the format it replaced.
    pub fn register(&mut self, ext: &str, id: FormatId) -> Option<FormatId> {
        self.by_extension.insert(normalize_extension(ext), id)
    }

    pub fn get(&self, ext: &str) -> Option<FormatId> {
        self.by_extension.get(&normalize_extension(ext)).copied()
    }

    /// Resolve a path by its extension.
    pub fn find(&self, path: &Path) -> Result<FormatId> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        self.get(ext).ok_or_else(|| {
            RecordError::UnsupportedExtension(if ext.is_empty() {
                path.display().to_string()
            } else {
                format!(".{ext}")
            })
        })
    }
}

/// Resolve a path with the built-in registry.
pub fn find_format(path: impl AsRef<Path>) -> Result<FormatId> {
    Registry::default().find(path.as_ref())
}

// ── Dispatch ─────────────────────────────────────────────────────────────────

/// Evaluate `$body` with `$F` bound to the marker type of a [`FormatId`].
///
/// ```ignore
/// let records = with_format!(id, |F| read_blocks::<F, _>(reader))?;
/// ```
macro_rules! with_format {
    ($id:expr, |$F:ident| $body:expr) => {
        match $id {
            $crate::registry::FormatId::Intel => {
                type $F = $crate::formats::Intel;
                $body
            }
            $crate::registry::FormatId::Motorola => {
                type $F = $crate::formats::Motorola;
                $body
            }
            $crate::registry::FormatId::Mos => {
                type $F = $crate::formats::Mos;
                $body
            }
            $crate::registry::FormatId::Binary => {
                type $F = $crate::formats::Binary;
                $body
            }
        }
    };
}

pub(crate) use with_format;

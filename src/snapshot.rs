//! A point-in-time view of the unit's registers and the parameter metadata
//! that accompanies it.
//!
//! A [`Snapshot`] is immutable once fetched; no register is guaranteed to be
//! present, since different firmware generations report different subsets of
//! the map. Callers always go through the accessors here instead of poking at
//! raw strings.

use crate::registers::{Mode, Program, RegisterIndex};
use std::collections::BTreeMap;

/// A flat register-id → raw-value map as reported by one status read-out.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    values: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw integer value of a register, if present and numeric.
    pub fn raw(&self, key: &str) -> Option<i64> {
        self.values.get(key)?.trim().parse().ok()
    }

    /// The register value with its table scale applied.
    ///
    /// This is the resolved-value lookup the interpreter's secondary fallback
    /// sources use. Registers that are not in the table are treated as
    /// unscaled.
    pub fn value(&self, key: &str) -> Option<f64> {
        let raw = self.raw(key)?;
        Some(match RegisterIndex::from_key(key) {
            Some(register) => register.data_type().resolve(raw),
            None => raw as f64,
        })
    }

    /// The verbatim string reported for a register. Flag registers compare
    /// against `"1"` through this accessor.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|v| v.as_str())
    }

    /// The active program authority, decoded from `H10701`.
    pub fn program(&self) -> Option<Program> {
        self.raw("H10701").map(Program::from_raw)
    }

    /// The active operating mode, decoded from `H10705`.
    ///
    /// Out-of-table mode values come back as `None`; the interpreter treats
    /// that the same as an absent register.
    pub fn mode(&self) -> Option<Mode> {
        let raw = self.raw("H10705")?;
        Mode::from_repr(u8::try_from(raw).ok()?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self { values: iter.into_iter().collect() }
    }
}

/// Ordered lists of condition-flag registers, keyed by severity.
///
/// The order matters: warnings and alerts are reported to the user in the
/// order the unit declares them, not in snapshot order.
#[derive(Debug, Clone, Default)]
pub struct ParamTable {
    pub warning: Vec<String>,
    pub alert: Vec<String>,
}

/// Register-id → human-readable text, as served by the unit's language files.
#[derive(Debug, Clone, Default)]
pub struct Translations {
    texts: BTreeMap<String, String>,
}

impl Translations {
    pub fn new(texts: BTreeMap<String, String>) -> Self {
        Self { texts }
    }

    /// The human-readable text for a register id. Falls back to the id itself
    /// so an untranslated condition still shows up rather than vanishing.
    pub fn translate(&self, key: &str) -> String {
        match self.texts.get(key) {
            Some(text) => text.clone(),
            None => key.to_string(),
        }
    }
}

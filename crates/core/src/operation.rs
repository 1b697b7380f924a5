use std::collections::HashMap;

use crate::error::{OperationTableError, ValidationError};

/// One canonical operation and the extra verbs accepted for it.
#[derive(Debug)]
pub struct OperationEntry<Op: 'static> {
    pub operation: Op,
    pub canonical: &'static str,
    pub synonyms: &'static [&'static str],
}

/// Static alias table owned by a resource tool.
#[derive(Debug)]
pub struct OperationTable<Op: 'static> {
    tool: &'static str,
    entries: &'static [OperationEntry<Op>],
}

impl<Op: Copy + 'static> OperationTable<Op> {
    pub const fn new(tool: &'static str, entries: &'static [OperationEntry<Op>]) -> Self {
        Self { tool, entries }
    }

    pub fn tool(&self) -> &'static str {
        self.tool
    }

    /// Lower-cases and trims `raw`, then looks up its canonical operation.
    pub fn resolve(&self, raw: &str) -> Result<Op, ValidationError> {
        let normalized = raw.trim().to_lowercase();
        self.entries
            .iter()
            .find(|entry| {
                entry.canonical == normalized || entry.synonyms.contains(&normalized.as_str())
            })
            .map(|entry| entry.operation)
            .ok_or_else(|| {
                ValidationError::new("operation", format!("Unsupported operation: {}", raw))
            })
    }

    pub fn canonical_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.canonical).collect()
    }

    /// Rejects tables where one verb resolves to two operations or where an
    /// alias could never match a normalized input.
    pub fn validate(&self) -> Result<(), OperationTableError> {
        let mut seen: HashMap<&'static str, &'static str> = HashMap::new();

        for entry in self.entries {
            for &alias in std::iter::once(&entry.canonical).chain(entry.synonyms) {
                if alias.trim() != alias || alias.to_lowercase() != alias {
                    return Err(OperationTableError::NotNormalized {
                        tool: self.tool,
                        alias,
                    });
                }
                if let Some(first) = seen.insert(alias, entry.canonical) {
                    return Err(OperationTableError::DuplicateAlias {
                        tool: self.tool,
                        alias,
                        first,
                        second: entry.canonical,
                    });
                }
            }
        }

        Ok(())
    }
}

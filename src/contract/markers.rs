//! Declared structural markers for a task's output.
//!
//! # Catalog Format
//!
//! ```yaml
//! contract:
//!   sections: ["Key Insights"]
//!   items: { min: 5, fields: [Source], section: "Key Insights" }
//!   word_count: { min: 150, max: 300 }
//!   hashtags: { min: 3, max: 5 }
//!   patterns:
//!     call_to_action: "(?i)what do you think|share your"
//! ```
//!
//! Every marker is optional. An empty output always violates the contract.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Inclusive numeric bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
}

impl Bounds {
    pub fn new(min: Option<usize>, max: Option<usize>) -> Self {
        Self { min, max }
    }

    pub fn between(min: usize, max: usize) -> Self {
        Self::new(Some(min), Some(max))
    }

    pub fn at_least(min: usize) -> Self {
        Self::new(Some(min), None)
    }

    pub fn contains(&self, value: usize) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }

    fn check(&self, what: &str) -> Result<(), String> {
        if let (Some(min), Some(max)) = (self.min, self.max)
            && min > max
        {
            return Err(format!("{} min ({}) is greater than max ({})", what, min, max));
        }
        Ok(())
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, "{}..={}", min, max),
            (Some(min), None) => write!(f, "at least {}", min),
            (None, Some(max)) => write!(f, "at most {}", max),
            (None, None) => write!(f, "any"),
        }
    }
}

/// List item requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsMarker {
    /// Minimum number of distinct items.
    #[serde(default)]
    pub min: usize,

    /// Maximum number of distinct items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,

    /// `Field:` labels every item must carry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,

    /// Only count items inside this section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl ItemsMarker {
    pub fn bounds(&self) -> Bounds {
        Bounds::new(Some(self.min), self.max)
    }
}

/// Contract declaration as written in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemsMarker>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<Bounds>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashtags: Option<Bounds>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub patterns: BTreeMap<String, String>,
}

impl ContractSpec {
    /// Whether any marker beyond non-empty output is declared.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
            && self.items.is_none()
            && self.word_count.is_none()
            && self.hashtags.is_none()
            && self.patterns.is_empty()
    }

    /// Check the declaration and compile its patterns.
    ///
    /// Returns a description of the first problem found.
    pub fn compile(&self) -> Result<Vec<(String, Regex)>, String> {
        if self.sections.iter().any(|s| s.trim().is_empty()) {
            return Err("contract sections cannot be empty strings".to_string());
        }

        if let Some(items) = &self.items {
            items.bounds().check("contract items")?;
            if items.fields.iter().any(|f| f.trim().is_empty()) {
                return Err("contract item fields cannot be empty strings".to_string());
            }
        }
        if let Some(bounds) = &self.word_count {
            bounds.check("contract word_count")?;
        }
        if let Some(bounds) = &self.hashtags {
            bounds.check("contract hashtags")?;
        }

        let mut compiled = Vec::with_capacity(self.patterns.len());
        for (name, pattern) in &self.patterns {
            let regex = Regex::new(pattern).map_err(|e| {
                format!("contract pattern '{}' is not a valid regex: {}", name, e)
            })?;
            compiled.push((name.clone(), regex));
        }
        Ok(compiled)
    }
}

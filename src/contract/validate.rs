//! Output contract validation.

use super::markers::{Bounds, ContractSpec};
use super::text::{ListItem, find_section, has_field, hashtags, list_items, normalize_label, word_count};
use crate::agent::TaskResult;
use crate::template::BoundTask;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single structural marker the output failed to exhibit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "marker", rename_all = "snake_case")]
pub enum ContractViolation {
    /// The output is empty or whitespace only.
    EmptyOutput,
    /// A required section heading is absent.
    MissingSection { section: String },
    /// Wrong number of distinct list items.
    ItemCount { observed: usize, expected: Bounds },
    /// A list item lacks a required `Field:` label (item is 1-based).
    MissingField { item: usize, field: String },
    /// Word count outside the declared range.
    WordCount { observed: usize, expected: Bounds },
    /// Hashtag count outside the declared range.
    HashtagCount { observed: usize, expected: Bounds },
    /// A required pattern did not match.
    PatternNotFound { name: String, pattern: String },
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractViolation::EmptyOutput => write!(f, "output is empty"),
            ContractViolation::MissingSection { section } => {
                write!(f, "missing section '{}'", section)
            }
            ContractViolation::ItemCount { observed, expected } => write!(
                f,
                "found {} distinct list item(s), expected {}",
                observed, expected
            ),
            ContractViolation::MissingField { item, field } => {
                write!(f, "item {} is missing field '{}'", item, field)
            }
            ContractViolation::WordCount { observed, expected } => {
                write!(f, "word count is {}, expected {}", observed, expected)
            }
            ContractViolation::HashtagCount { observed, expected } => {
                write!(f, "found {} hashtag(s), expected {}", observed, expected)
            }
            ContractViolation::PatternNotFound { name, pattern } => {
                write!(f, "required pattern '{}' ({}) not found", name, pattern)
            }
        }
    }
}

/// The output of a task did not satisfy its contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("output of task '{task}' violates its contract: {}", format_violations(.violations))]
pub struct ContractViolationError {
    pub task: String,
    pub violations: Vec<ContractViolation>,
}

fn format_violations(violations: &[ContractViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A result that satisfied its contract, with the structure that was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedResult {
    pub task: String,
    pub output: String,
    /// Headlines of the distinct top-level list items.
    pub items: Vec<String>,
    pub word_count: usize,
    pub hashtags: Vec<String>,
}

/// Compiled contract attached to a task definition.
#[derive(Debug, Clone, Default)]
pub struct OutputContract {
    spec: ContractSpec,
    patterns: Vec<(String, Regex)>,
}

impl OutputContract {
    /// Compile a contract declaration.
    pub fn compile(spec: ContractSpec) -> Result<Self, String> {
        let patterns = spec.compile()?;
        Ok(Self { spec, patterns })
    }

    pub fn spec(&self) -> &ContractSpec {
        &self.spec
    }

    /// Validate a raw result against this contract.
    ///
    /// Every violated marker is reported; content is never altered.
    pub fn validate(
        &self,
        bound: &BoundTask,
        result: &TaskResult,
    ) -> Result<ValidatedResult, ContractViolationError> {
        let output = result.output().unwrap_or_default();
        let fail = |violations| ContractViolationError {
            task: bound.task.clone(),
            violations,
        };

        if output.trim().is_empty() {
            return Err(fail(vec![ContractViolation::EmptyOutput]));
        }

        let mut violations = Vec::new();

        for section in &self.spec.sections {
            if find_section(output, section).is_none() {
                violations.push(ContractViolation::MissingSection {
                    section: section.clone(),
                });
            }
        }

        let items = match &self.spec.items {
            Some(marker) => {
                let scope = match &marker.section {
                    Some(section) => find_section(output, section).unwrap_or_default(),
                    None => output.to_string(),
                };
                let items = distinct_items(list_items(&scope));

                let expected = marker.bounds();
                if !expected.contains(items.len()) {
                    violations.push(ContractViolation::ItemCount {
                        observed: items.len(),
                        expected,
                    });
                }
                for (index, item) in items.iter().enumerate() {
                    for field in &marker.fields {
                        if !has_field(item, field) {
                            violations.push(ContractViolation::MissingField {
                                item: index + 1,
                                field: field.clone(),
                            });
                        }
                    }
                }
                items
            }
            None => distinct_items(list_items(output)),
        };

        let words = word_count(output);
        if let Some(expected) = self.spec.word_count
            && !expected.contains(words)
        {
            violations.push(ContractViolation::WordCount {
                observed: words,
                expected,
            });
        }

        let tags = hashtags(output);
        if let Some(expected) = self.spec.hashtags
            && !expected.contains(tags.len())
        {
            violations.push(ContractViolation::HashtagCount {
                observed: tags.len(),
                expected,
            });
        }

        for (name, regex) in &self.patterns {
            if !regex.is_match(output) {
                violations.push(ContractViolation::PatternNotFound {
                    name: name.clone(),
                    pattern: regex.as_str().to_string(),
                });
            }
        }

        if !violations.is_empty() {
            return Err(fail(violations));
        }

        Ok(ValidatedResult {
            task: bound.task.clone(),
            output: output.to_string(),
            items: items.into_iter().map(|item| item.headline).collect(),
            word_count: words,
            hashtags: tags,
        })
    }
}

/// Drop items whose headline repeats an earlier one.
fn distinct_items(items: Vec<ListItem>) -> Vec<ListItem> {
    let mut seen: Vec<String> = Vec::new();
    items
        .into_iter()
        .filter(|item| {
            let key = normalize_label(item.headline.trim_end_matches(['.', '!', ';', ',']));
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        })
        .collect()
}

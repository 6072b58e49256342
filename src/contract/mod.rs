//! Output contracts.
//!
//! A task's expected output is checked structurally, never semantically:
//! required sections, item counts and fields, word and hashtag ranges, and
//! named patterns. Violations carry enough detail to drive a bounded retry.

mod markers;
mod text;
mod validate;


pub use markers::{Bounds, ContractSpec, ItemsMarker};
pub use text::{ListItem, extract_sections, find_section, hashtags, list_items, word_count};
pub use validate::{ContractViolation, ContractViolationError, OutputContract, ValidatedResult};

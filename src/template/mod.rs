//! Task templating.
//!
//! - **Syntax**: `{placeholder}` parsing and literal rendering
//! - **Binder**: resolves a task definition against run parameters and
//!   upstream results into a [`BoundTask`]
//!
//! Use `{{` to escape and render a literal `{`.

mod binder;
mod syntax;

pub use binder::{
    BoundTask, ParameterSet, UnboundPlaceholderError, UpstreamContext, bind,
    missing_placeholders,
};
pub use syntax::{Template, TemplateError, render_template, vars};

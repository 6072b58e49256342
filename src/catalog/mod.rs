//! Task catalog.
//!
//! The catalog is a YAML mapping of task name to definition, loaded and fully
//! validated once at startup:
//!
//! ```yaml
//! research_topic:
//!   agent: researcher
//!   output_key: research
//!   description: "Research the topic '{topic}' and gather current information."
//!   expected_output: "A research brief with a Key Insights section"
//!   contract:
//!     sections: ["Key Insights"]
//!     items: { min: 5, section: "Key Insights" }
//!
//! create_content:
//!   agent: content_creator
//!   depends_on: [research_topic]
//!   defaults:
//!     tone: professional
//!   description: "Write a {tone} LinkedIn post about '{topic}'.\n\n{research}"
//!   expected_output: "150 to 300 words and 3 to 5 hashtags"
//!   contract:
//!     word_count: { min: 150, max: 300 }
//!     hashtags: { min: 3, max: 5 }
//! ```
//!
//! Declaration order is preserved and is the order `list()` reports.

mod model;
mod store;


pub use model::TaskDefinition;
pub use store::{BUILTIN_CATALOG, TemplateStore};

//! Building blocks of the `lore` command-line tool.

pub mod config;
pub mod input;
pub mod render;

pub use config::{OFFLINE_DIMENSIONS, ProviderSettings, retry_policy};
pub use input::{read_document, read_nodes};
pub use render::entity_table;

//! Routing: the path trie, per-method entry point, dispatcher, and common routes.

pub mod common;
pub mod dispatch;
pub mod entry;
pub mod tree;
pub use common::common_routes;
pub use dispatch::{app, dispatch};
pub use entry::{mount_templates, EntryPoint, MountTemplates};
pub use tree::{Endpoint, Match, PathTree};

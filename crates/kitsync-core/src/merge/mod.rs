//! In-place merging of kitsync entries into shared project documents.
//!
//! Two shapes are supported: the hook registry in the settings document and
//! the endpoint map in the MCP document.

pub mod document;
pub mod endpoints;
pub mod hooks;
pub mod ownership;

pub use document::JsonDocument;
pub use endpoints::{EndpointRegistry, MCP_SERVERS_FIELD};
pub use hooks::{HOOKS_FIELD, HookRegistry};
pub use ownership::{OWNER_MARKER_FIELD, hash_json, hash_json_map};

pub mod tools;

pub use tools::{resolve, ToolIdentity, REGISTRY_SIZE, TOOL_REGISTRY, UNKNOWN_TOOL_COLOR};

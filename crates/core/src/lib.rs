//! # Ferrule Core
//!
//! Domain types, traits, and error definitions for the Ferrule agent.
//! This crate holds no transport or terminal code. It defines the model
//! that the provider, tool, and agent crates implement against:
//!
//! - [`message`]: transcript entries and tool call requests
//! - [`tool`]: the `Tool` trait and the registry that dispatches calls
//! - [`provider`]: the backend dialects and the completion contract
//! - [`error`]: one error enum per bounded context

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError};
pub use message::{Message, Role, ToolCallRequest, Transcript};
pub use provider::{ApiType, Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition};
pub use tool::{Tool, ToolRegistry, ToolResult};

//! Model gateway for Ferrule.
//!
//! [`ModelGateway`] is the single entry point the orchestrator talks to. It
//! is configured for one of the two dialects and drives an
//! [`OpenAiCompatProvider`] underneath; both hosted and local servers expose
//! the `/chat/completions` endpoint, so only the dialect rules differ.

pub mod gateway;
pub mod openai_compat;

pub use gateway::{GatewayEvent, GatewaySettings, GatewayStream, ModelGateway};
pub use openai_compat::OpenAiCompatProvider;

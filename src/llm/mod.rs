//! External model collaborators.
//!
//! The response generator and the embedding function are opaque HTTP
//! services behind traits; the core only composes text and vectors.

pub mod embedding;
pub mod groq;
pub mod provider;
pub mod types;

pub use groq::GroqProvider;
pub use provider::LlmProvider;
pub use types::{ChatMessage, ChatRequest};

//! Retrieval-augmented conversational assistant backend.
//!
//! An offline ingestion pass builds a persisted vector index from a document
//! directory; at request time the engine combines the channel's effective
//! identity, the top-k most similar chunks, and the recent conversation
//! window into one prompt for an external generation service.

pub mod config;
pub mod core;
pub mod engine;
pub mod history;
pub mod identity;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod prompt;
pub mod server;
pub mod state;

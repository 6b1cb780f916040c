//! External backend clients
//!
//! - [`ChatClient`]: OpenAI-compatible chat completions ([`crate::types::TextGenerator`])
//! - [`ImageSearchClient`]: keyword image search ([`crate::types::MediaLookup`])

pub mod chat_client;
pub mod image_search;

pub use chat_client::ChatClient;
pub use image_search::ImageSearchClient;

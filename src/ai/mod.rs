pub mod action;
pub mod client;
pub mod context;
pub mod extract;
pub mod parse;
pub mod prompts;

pub use client::{ChatMessage, ChatTransport, GenerateParams, PerplexityClient};
pub use extract::RawResponse;

// Core modules
pub mod config;
pub mod inference;
pub mod llama2;
pub mod services;
pub mod state;
pub mod tokenizer;
pub mod types;
pub mod web;

// Re-exports
pub use config::Config;
pub use services::{ChatService, StreamingDecoder, TokenStream};
pub use state::AppState;
pub use types::{ChatError, Termination, Turn};

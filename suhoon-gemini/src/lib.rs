mod client;
mod endpoint;
mod wire;

pub use client::GeminiClient;
pub use endpoint::{DEFAULT_MODEL, api_key_from_env};
pub use wire::response_schema;

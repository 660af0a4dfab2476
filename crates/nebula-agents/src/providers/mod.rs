//! Concrete provider clients

mod gemini;
mod http;

pub use gemini::GeminiClient;
pub use http::HttpLlmClient;

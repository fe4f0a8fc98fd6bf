// Google Gemini driver for the Relay gateway
//
// Talks the streamGenerateContent SSE protocol directly and reduces its
// chunks to the core engine's tagged parts. Exposes the `google-native`
// backend and the raw driver for the multi backend's google/vertexai
// routing.

pub mod driver;
pub mod extract;
pub mod mapper;
pub mod provider;
pub mod types;

pub use driver::{GeminiClient, GeminiDriver, GEMINI_API_BASE};
pub use provider::GoogleNativeProvider;

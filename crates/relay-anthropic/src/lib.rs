// Anthropic Claude driver for the Relay gateway

pub mod driver;
pub mod extract;
pub mod mapper;
pub mod types;

pub use driver::{AnthropicClient, AnthropicDriver, ANTHROPIC_API_URL, ANTHROPIC_VERSION};

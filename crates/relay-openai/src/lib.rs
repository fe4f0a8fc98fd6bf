// OpenAI-protocol driver for the Relay gateway
//
// Covers OpenAI (Chat Completions and the Responses API) and xAI, whose
// endpoint is OpenAI-compatible.

pub mod chat;
pub mod driver;
pub mod mapper;
pub mod responses;

pub use driver::{
    OpenAiClient, OpenAiDriver, OpenAiEndpoints, OPENAI_CHAT_URL, OPENAI_RESPONSES_URL,
    XAI_CHAT_URL,
};

// Event extraction: Messages API SSE events -> tagged native parts
//
// Usage spans two events (input tokens on message_start, output tokens on
// message_delta), so the extractor keeps running counts and emits a fresh
// snapshot each time; the engine buffers the last one.

use relay_core::delta::UsageDelta;
use relay_core::error::ProviderFailure;
use relay_core::stream::NativePart;
use tracing::debug;

use crate::types::{
    BlockDelta, ContentBlockDeltaEvent, ContentBlockInfo, ContentBlockStart, MessageDeltaEvent,
    MessageStart,
};

#[derive(Default)]
pub struct EventExtractor {
    input_tokens: u32,
    output_tokens: u32,
}

impl EventExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract(
        &mut self,
        event_name: &str,
        data: &str,
    ) -> Result<Vec<NativePart>, ProviderFailure> {
        match event_name {
            "message_start" => {
                let start: MessageStart = parse(data)?;
                if let Some(usage) = start.message.usage {
                    self.input_tokens = usage.input_tokens;
                }
                Ok(vec![self.usage_snapshot()])
            }
            "content_block_start" => {
                let start: ContentBlockStart = parse(data)?;
                match start.content_block {
                    ContentBlockInfo::ToolUse { id, name } => {
                        Ok(vec![NativePart::FunctionCallFragment {
                            index: start.index,
                            id: Some(id),
                            name: Some(name),
                            arguments: String::new(),
                        }])
                    }
                    ContentBlockInfo::Other => Ok(Vec::new()),
                }
            }
            "content_block_delta" => {
                let event: ContentBlockDeltaEvent = parse(data)?;
                let part = match event.delta {
                    BlockDelta::TextDelta { text } => NativePart::Text(text),
                    BlockDelta::ThinkingDelta { thinking } => NativePart::Reasoning(thinking),
                    BlockDelta::InputJsonDelta { partial_json } => {
                        NativePart::FunctionCallFragment {
                            index: event.index,
                            id: None,
                            name: None,
                            arguments: partial_json,
                        }
                    }
                    BlockDelta::SignatureDelta { signature } => {
                        NativePart::ThoughtSignature(signature)
                    }
                    BlockDelta::Other => {
                        debug!("skipping unrecognized content block delta");
                        return Ok(Vec::new());
                    }
                };
                Ok(vec![part])
            }
            "message_delta" => {
                let event: MessageDeltaEvent = parse(data)?;
                if let Some(usage) = event.usage {
                    self.output_tokens = usage.output_tokens;
                }
                Ok(vec![self.usage_snapshot()])
            }
            "error" => Err(ProviderFailure::provider(format!(
                "Anthropic stream error: {data}"
            ))),
            // content_block_stop, message_stop, ping, anything new
            _ => Ok(Vec::new()),
        }
    }

    fn usage_snapshot(&self) -> NativePart {
        NativePart::Usage(UsageDelta {
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            total_tokens: self.input_tokens + self.output_tokens,
            thinking_tokens: 0,
        })
    }
}

fn parse<T: serde::de::DeserializeOwned>(data: &str) -> Result<T, ProviderFailure> {
    serde_json::from_str(data)
        .map_err(|e| ProviderFailure::provider(format!("failed to parse event: {e}")))
}

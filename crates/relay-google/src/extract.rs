// Chunk extraction: Gemini stream chunks -> tagged native parts
//
// Gemini delivers function calls complete in a single part, so each one
// gets a fresh sequential index for the engine's assembly table. Part
// kinds the extractor does not recognize are skipped, not fatal.

use relay_core::delta::{GroundingDelta, GroundingSource, GroundingSupport, UsageDelta};
use relay_core::stream::NativePart;
use tracing::debug;

use crate::types::{GenerateContentChunk, GroundingMetadata};

/// Stateful per-stream extractor.
#[derive(Default)]
pub struct ChunkExtractor {
    next_call_index: u32,
}

impl ChunkExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract(&mut self, chunk: GenerateContentChunk) -> Vec<NativePart> {
        let mut out = Vec::new();

        if let Some(candidate) = chunk.candidates.into_iter().next() {
            if let Some(content) = candidate.content {
                for part in content.parts {
                    if let Some(signature) = part.thought_signature {
                        out.push(NativePart::ThoughtSignature(signature));
                    }

                    if part.thought == Some(true) {
                        if let Some(text) = part.text {
                            out.push(NativePart::Reasoning(text));
                        }
                    } else if let Some(call) = part.function_call {
                        let arguments = if call.args.is_null() {
                            "{}".to_string()
                        } else {
                            call.args.to_string()
                        };
                        out.push(NativePart::FunctionCallFragment {
                            index: self.next_call_index,
                            id: None,
                            name: Some(call.name),
                            arguments,
                        });
                        self.next_call_index += 1;
                    } else if let Some(code) = part.executable_code {
                        out.push(NativePart::ExecutableCode(code.code));
                    } else if let Some(result) = part.code_execution_result {
                        out.push(NativePart::CodeExecutionResult(
                            result.output.unwrap_or_default(),
                        ));
                    } else if let Some(text) = part.text {
                        out.push(NativePart::Text(text));
                    } else {
                        debug!("skipping unrecognized part kind in Gemini chunk");
                    }
                }
            }

            if let Some(metadata) = candidate.grounding_metadata {
                out.push(NativePart::Grounding(build_grounding(metadata)));
            }
        }

        if let Some(usage) = chunk.usage_metadata {
            out.push(NativePart::Usage(UsageDelta {
                input_tokens: usage.prompt_token_count.unwrap_or(0),
                output_tokens: usage.candidates_token_count.unwrap_or(0),
                total_tokens: usage.total_token_count.unwrap_or(0),
                thinking_tokens: usage.thoughts_token_count.unwrap_or(0),
            }));
        }

        out
    }
}

/// Build a grounding delta from Gemini grounding metadata.
///
/// Sources without web info are skipped; supports without a segment keep
/// zeroed spans.
pub fn build_grounding(metadata: GroundingMetadata) -> GroundingDelta {
    let sources = metadata
        .grounding_chunks
        .unwrap_or_default()
        .into_iter()
        .filter_map(|chunk| {
            chunk.web.map(|web| GroundingSource {
                uri: web.uri.unwrap_or_default(),
                title: web.title.unwrap_or_default(),
            })
        })
        .collect();

    let supports = metadata
        .grounding_supports
        .unwrap_or_default()
        .into_iter()
        .map(|support| {
            let segment = support.segment.unwrap_or_default();
            GroundingSupport {
                start_index: segment.start_index.unwrap_or(0),
                end_index: segment.end_index.unwrap_or(0),
                text: segment.text.unwrap_or_default(),
                source_indices: support.grounding_chunk_indices.unwrap_or_default(),
            }
        })
        .collect();

    GroundingDelta {
        web_search_queries: metadata.web_search_queries.unwrap_or_default(),
        sources,
        supports,
        search_entry_point_html: metadata
            .search_entry_point
            .and_then(|entry| entry.rendered_content)
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_chunk(value: serde_json::Value) -> GenerateContentChunk {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn extracts_text_and_usage_from_a_chunk() {
        let chunk = parse_chunk(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello!"}]}
            }],
            "usageMetadata": {
                "promptTokenCount": 10,
                "candidatesTokenCount": 20,
                "totalTokenCount": 30,
                "thoughtsTokenCount": 5
            }
        }));

        let parts = ChunkExtractor::new().extract(chunk);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], NativePart::Text("Hello!".into()));
        assert_eq!(
            parts[1],
            NativePart::Usage(UsageDelta {
                input_tokens: 10,
                output_tokens: 20,
                total_tokens: 30,
                thinking_tokens: 5,
            })
        );
    }

    #[test]
    fn thought_parts_become_reasoning() {
        let chunk = parse_chunk(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "pondering", "thought": true},
                    {"text": "answer"}
                ]}
            }]
        }));

        let parts = ChunkExtractor::new().extract(chunk);
        assert_eq!(parts[0], NativePart::Reasoning("pondering".into()));
        assert_eq!(parts[1], NativePart::Text("answer".into()));
    }

    #[test]
    fn function_calls_get_sequential_indices() {
        let mut extractor = ChunkExtractor::new();
        let chunk = parse_chunk(json!({
            "candidates": [{
                "content": {"parts": [
                    {"functionCall": {"name": "server__read", "args": {"path": "/tmp"}}},
                    {"functionCall": {"name": "server__list", "args": {}}}
                ]}
            }]
        }));

        let parts = extractor.extract(chunk);
        match (&parts[0], &parts[1]) {
            (
                NativePart::FunctionCallFragment { index: 0, name: n0, arguments: a0, .. },
                NativePart::FunctionCallFragment { index: 1, name: n1, .. },
            ) => {
                assert_eq!(n0.as_deref(), Some("server__read"));
                assert_eq!(a0, r#"{"path":"/tmp"}"#);
                assert_eq!(n1.as_deref(), Some("server__list"));
            }
            other => panic!("unexpected parts {other:?}"),
        }

        // Indices keep climbing across chunks of the same stream.
        let chunk = parse_chunk(json!({
            "candidates": [{"content": {"parts": [
                {"functionCall": {"name": "server__stat"}}
            ]}}]
        }));
        match &extractor.extract(chunk)[0] {
            NativePart::FunctionCallFragment { index: 2, arguments, .. } => {
                assert_eq!(arguments, "{}");
            }
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[test]
    fn code_execution_parts_split_code_and_output() {
        let chunk = parse_chunk(json!({
            "candidates": [{
                "content": {"parts": [
                    {"executableCode": {"language": "PYTHON", "code": "print(1)"}},
                    {"codeExecutionResult": {"outcome": "OUTCOME_OK", "output": "1\n"}}
                ]}
            }]
        }));

        let parts = ChunkExtractor::new().extract(chunk);
        assert_eq!(parts[0], NativePart::ExecutableCode("print(1)".into()));
        assert_eq!(parts[1], NativePart::CodeExecutionResult("1\n".into()));
    }

    #[test]
    fn thought_signatures_are_captured() {
        let chunk = parse_chunk(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "hi", "thoughtSignature": "sig-abc"}
                ]}
            }]
        }));

        let parts = ChunkExtractor::new().extract(chunk);
        assert_eq!(parts[0], NativePart::ThoughtSignature("sig-abc".into()));
        assert_eq!(parts[1], NativePart::Text("hi".into()));
    }

    #[test]
    fn empty_candidates_produce_nothing() {
        let parts = ChunkExtractor::new().extract(parse_chunk(json!({"candidates": []})));
        assert!(parts.is_empty());
    }

    #[test]
    fn grounding_with_all_fields() {
        let metadata: GroundingMetadata = serde_json::from_value(json!({
            "webSearchQueries": ["UEFA Euro 2024 winner", "Spain Euro 2024"],
            "groundingChunks": [
                {"web": {"uri": "https://www.uefa.com/euro2024/", "title": "UEFA.com"}}
            ],
            "groundingSupports": [{
                "segment": {"startIndex": 0, "endIndex": 20, "text": "Spain won Euro 2024"},
                "groundingChunkIndices": [0]
            }],
            "searchEntryPoint": {"renderedContent": "<div>search widget</div>"}
        }))
        .unwrap();

        let delta = build_grounding(metadata);
        assert_eq!(
            delta.web_search_queries,
            vec!["UEFA Euro 2024 winner", "Spain Euro 2024"]
        );
        assert_eq!(delta.sources.len(), 1);
        assert_eq!(delta.sources[0].uri, "https://www.uefa.com/euro2024/");
        assert_eq!(delta.sources[0].title, "UEFA.com");
        assert_eq!(delta.supports.len(), 1);
        assert_eq!(delta.supports[0].start_index, 0);
        assert_eq!(delta.supports[0].end_index, 20);
        assert_eq!(delta.supports[0].text, "Spain won Euro 2024");
        assert_eq!(delta.supports[0].source_indices, vec![0]);
        assert_eq!(delta.search_entry_point_html, "<div>search widget</div>");
    }

    #[test]
    fn grounding_without_queries_is_url_context_style() {
        let metadata: GroundingMetadata = serde_json::from_value(json!({
            "groundingChunks": [
                {"web": {"uri": "https://docs.k8s.io/pods", "title": "Kubernetes Pods"}}
            ]
        }))
        .unwrap();

        let delta = build_grounding(metadata);
        assert!(delta.web_search_queries.is_empty());
        assert_eq!(delta.sources[0].uri, "https://docs.k8s.io/pods");
        assert!(delta.supports.is_empty());
        assert_eq!(delta.search_entry_point_html, "");
    }

    #[test]
    fn grounding_handles_empty_metadata() {
        let delta = build_grounding(GroundingMetadata::default());
        assert!(delta.web_search_queries.is_empty());
        assert!(delta.sources.is_empty());
        assert!(delta.supports.is_empty());
        assert_eq!(delta.search_entry_point_html, "");
    }

    #[test]
    fn grounding_skips_sources_without_web_info() {
        let metadata: GroundingMetadata = serde_json::from_value(json!({
            "groundingChunks": [{}, {"web": {"uri": "https://example.com"}}]
        }))
        .unwrap();

        let delta = build_grounding(metadata);
        assert_eq!(delta.sources.len(), 1);
        assert_eq!(delta.sources[0].uri, "https://example.com");
        assert_eq!(delta.sources[0].title, "");
    }

    #[test]
    fn grounding_support_without_segment_keeps_zeroed_span() {
        let metadata: GroundingMetadata = serde_json::from_value(json!({
            "groundingSupports": [{}]
        }))
        .unwrap();

        let delta = build_grounding(metadata);
        assert_eq!(delta.supports.len(), 1);
        assert_eq!(delta.supports[0].start_index, 0);
        assert_eq!(delta.supports[0].end_index, 0);
        assert_eq!(delta.supports[0].text, "");
        assert!(delta.supports[0].source_indices.is_empty());
    }

    #[test]
    fn grounding_with_multiple_sources_and_supports() {
        let metadata: GroundingMetadata = serde_json::from_value(json!({
            "webSearchQueries": ["query1"],
            "groundingChunks": [
                {"web": {"uri": "https://example1.com", "title": "Example 1"}},
                {"web": {"uri": "https://example2.com", "title": "Example 2"}}
            ],
            "groundingSupports": [
                {
                    "segment": {"startIndex": 0, "endIndex": 10, "text": "First part"},
                    "groundingChunkIndices": [0]
                },
                {
                    "segment": {"startIndex": 11, "endIndex": 20, "text": "Second part"},
                    "groundingChunkIndices": [0, 1]
                }
            ]
        }))
        .unwrap();

        let delta = build_grounding(metadata);
        assert_eq!(delta.sources.len(), 2);
        assert_eq!(delta.supports.len(), 2);
        assert_eq!(delta.supports[1].source_indices, vec![0, 1]);
    }
}

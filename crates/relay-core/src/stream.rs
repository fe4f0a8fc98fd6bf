// Provider-agnostic streaming engine
//
// Drivers reduce their native chunk format to a stream of tagged
// [`NativePart`]s; the engine turns one such stream into outbound deltas
// under the rules every provider shares:
//
//   - text / reasoning / code parts are forwarded immediately
//   - function-call fragments are accumulated per index and emitted only
//     once the upstream stream ends, fully assembled
//   - grounding and usage are buffered (last one wins) and emitted after
//     all content, so an aborted empty stream stays retryable
//   - a wall-clock deadline covers the whole attempt
//
// The attempt outcome is a value, not an exception: the retry guard never
// has to catch anything.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures::{Stream, StreamExt};
use tokio::time::{timeout_at, Instant};

use crate::delta::{
    CodeExecutionDelta, Delta, GroundingDelta, ToolCallDelta, UsageDelta,
};
use crate::error::ProviderFailure;
use crate::ids;
use crate::signatures::SignatureCache;
use crate::tool_names;

/// Wall-clock budget for one upstream attempt.
pub const STREAM_TIMEOUT: Duration = Duration::from_secs(180);

/// One tagged part extracted from a provider-native chunk.
///
/// Extractors that meet an unknown part kind skip it with a log line
/// instead of producing anything here.
#[derive(Debug, Clone, PartialEq)]
pub enum NativePart {
    /// Assistant text.
    Text(String),
    /// Reasoning / chain-of-thought text.
    Reasoning(String),
    /// A function-call fragment. `id` and `name` arrive on whichever
    /// fragment first carries them; `arguments` fragments concatenate.
    FunctionCallFragment {
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },
    /// Code the provider is about to execute.
    ExecutableCode(String),
    /// Output of provider-side code execution.
    CodeExecutionResult(String),
    /// Grounding metadata snapshot.
    Grounding(GroundingDelta),
    /// Usage metadata snapshot.
    Usage(UsageDelta),
    /// Opaque reasoning-continuation signature.
    ThoughtSignature(String),
}

/// Stream of native parts for one upstream attempt.
pub type PartStream = Pin<Box<dyn Stream<Item = Result<NativePart, ProviderFailure>> + Send>>;

/// Outbound delta stream for one request.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Delta> + Send>>;

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptEnd {
    /// Upstream finished and content was emitted.
    Completed,
    /// Transient condition (timeout, empty stream); the guard may retry.
    Retryable(String),
    /// Hard failure; surfaced to the caller as-is.
    Fatal(ProviderFailure),
}

/// Item produced while driving one attempt. The `End` is always last.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptItem {
    Delta(Delta),
    End(AttemptEnd),
}

/// Destination for thought signatures observed on the stream.
#[derive(Clone)]
pub struct SignatureSink {
    pub cache: Arc<SignatureCache>,
    pub execution_id: String,
}

impl SignatureSink {
    pub fn new(cache: Arc<SignatureCache>, execution_id: impl Into<String>) -> Self {
        Self {
            cache,
            execution_id: execution_id.into(),
        }
    }
}

#[derive(Default)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl PendingCall {
    fn merge(&mut self, id: Option<String>, name: Option<String>, arguments: &str) {
        if self.id.is_none() {
            self.id = id.filter(|s| !s.is_empty());
        }
        if self.name.is_none() {
            self.name = name.filter(|s| !s.is_empty());
        }
        self.arguments.push_str(arguments);
    }

    fn finish(self) -> ToolCallDelta {
        ToolCallDelta {
            call_id: self.id.unwrap_or_else(ids::short_id),
            name: tool_names::tool_name_from_api(self.name.as_deref().unwrap_or_default()),
            arguments: if self.arguments.is_empty() {
                "{}".to_string()
            } else {
                self.arguments
            },
        }
    }
}

/// Drive one upstream attempt to completion.
///
/// Emits zero or more `Delta` items followed by exactly one `End`.
pub fn drive_attempt(
    mut parts: PartStream,
    timeout: Duration,
    signatures: Option<SignatureSink>,
) -> impl Stream<Item = AttemptItem> {
    stream! {
        let deadline = Instant::now() + timeout;
        let mut has_content = false;
        let mut pending: BTreeMap<u32, PendingCall> = BTreeMap::new();
        let mut grounding: Option<GroundingDelta> = None;
        let mut usage: Option<UsageDelta> = None;

        loop {
            let next = match timeout_at(deadline, parts.next()).await {
                Ok(next) => next,
                Err(_) => {
                    yield AttemptItem::End(AttemptEnd::Retryable(format!(
                        "generation timed out after {}s",
                        timeout.as_secs()
                    )));
                    return;
                }
            };

            let part = match next {
                Some(Ok(part)) => part,
                Some(Err(failure)) => {
                    yield AttemptItem::End(AttemptEnd::Fatal(failure));
                    return;
                }
                None => break,
            };

            match part {
                NativePart::Text(text) => {
                    if !text.is_empty() {
                        has_content = true;
                        yield AttemptItem::Delta(Delta::Text(text));
                    }
                }
                NativePart::Reasoning(text) => {
                    if !text.is_empty() {
                        has_content = true;
                        yield AttemptItem::Delta(Delta::Thinking(text));
                    }
                }
                NativePart::ExecutableCode(code) => {
                    has_content = true;
                    yield AttemptItem::Delta(Delta::CodeExecution(CodeExecutionDelta {
                        code,
                        result: String::new(),
                    }));
                }
                NativePart::CodeExecutionResult(result) => {
                    has_content = true;
                    yield AttemptItem::Delta(Delta::CodeExecution(CodeExecutionDelta {
                        code: String::new(),
                        result,
                    }));
                }
                NativePart::FunctionCallFragment { index, id, name, arguments } => {
                    pending.entry(index).or_default().merge(id, name, &arguments);
                }
                NativePart::Grounding(delta) => grounding = Some(delta),
                NativePart::Usage(delta) => usage = Some(delta),
                NativePart::ThoughtSignature(signature) => {
                    if let Some(sink) = &signatures {
                        sink.cache.put(&sink.execution_id, signature);
                    }
                }
            }
        }

        // Upstream ended: flush assembled tool calls in index order.
        for (_, call) in std::mem::take(&mut pending) {
            has_content = true;
            yield AttemptItem::Delta(Delta::ToolCall(call.finish()));
        }

        // Buffered usage and grounding alone do not count as content.
        if !has_content {
            yield AttemptItem::End(AttemptEnd::Retryable(
                "empty response from LLM (no content generated)".to_string(),
            ));
            return;
        }

        if let Some(delta) = grounding.take() {
            yield AttemptItem::Delta(Delta::Grounding(delta));
        }
        if let Some(delta) = usage.take() {
            yield AttemptItem::Delta(Delta::Usage(delta));
        }
        yield AttemptItem::End(AttemptEnd::Completed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn parts_stream(parts: Vec<NativePart>) -> PartStream {
        Box::pin(stream::iter(parts.into_iter().map(Ok)))
    }

    async fn drive(parts: Vec<NativePart>) -> (Vec<Delta>, AttemptEnd) {
        drive_with(parts_stream(parts), None).await
    }

    async fn drive_with(
        parts: PartStream,
        signatures: Option<SignatureSink>,
    ) -> (Vec<Delta>, AttemptEnd) {
        let mut items = Box::pin(drive_attempt(parts, STREAM_TIMEOUT, signatures));
        let mut deltas = Vec::new();
        while let Some(item) = items.next().await {
            match item {
                AttemptItem::Delta(delta) => deltas.push(delta),
                AttemptItem::End(end) => return (deltas, end),
            }
        }
        unreachable!("attempt stream ended without an End item");
    }

    #[tokio::test]
    async fn forwards_text_immediately() {
        let (deltas, end) = drive(vec![NativePart::Text("Hello!".into())]).await;
        assert_eq!(deltas, vec![Delta::Text("Hello!".into())]);
        assert_eq!(end, AttemptEnd::Completed);
    }

    #[tokio::test]
    async fn usage_is_buffered_until_after_content() {
        let (deltas, end) = drive(vec![
            NativePart::Usage(UsageDelta {
                input_tokens: 1,
                output_tokens: 1,
                total_tokens: 2,
                thinking_tokens: 0,
            }),
            NativePart::Text("Hello!".into()),
            NativePart::Usage(UsageDelta {
                input_tokens: 10,
                output_tokens: 20,
                total_tokens: 30,
                thinking_tokens: 5,
            }),
        ])
        .await;

        assert_eq!(end, AttemptEnd::Completed);
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0], Delta::Text("Hello!".into()));
        // Only the last usage snapshot survives, emitted after the content.
        assert_eq!(
            deltas[1],
            Delta::Usage(UsageDelta {
                input_tokens: 10,
                output_tokens: 20,
                total_tokens: 30,
                thinking_tokens: 5,
            })
        );
    }

    #[tokio::test]
    async fn assembles_fragmented_tool_call() {
        let (deltas, end) = drive(vec![
            NativePart::FunctionCallFragment {
                index: 0,
                id: Some("c1".into()),
                name: Some("server__read".into()),
                arguments: r#"{"pa"#.into(),
            },
            NativePart::FunctionCallFragment {
                index: 0,
                id: None,
                name: None,
                arguments: r#"th":"/tmp"}"#.into(),
            },
        ])
        .await;

        assert_eq!(end, AttemptEnd::Completed);
        assert_eq!(
            deltas,
            vec![Delta::ToolCall(ToolCallDelta {
                call_id: "c1".into(),
                name: "server.read".into(),
                arguments: r#"{"path":"/tmp"}"#.into(),
            })]
        );
    }

    #[tokio::test]
    async fn flushes_tool_calls_in_index_order() {
        let (deltas, _) = drive(vec![
            NativePart::FunctionCallFragment {
                index: 1,
                id: Some("c2".into()),
                name: Some("b".into()),
                arguments: "{}".into(),
            },
            NativePart::FunctionCallFragment {
                index: 0,
                id: Some("c1".into()),
                name: Some("a".into()),
                arguments: "{}".into(),
            },
        ])
        .await;

        let names: Vec<_> = deltas
            .iter()
            .map(|d| match d {
                Delta::ToolCall(tc) => tc.name.as_str(),
                other => panic!("unexpected delta {other:?}"),
            })
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn tool_call_without_id_gets_a_generated_one() {
        let (deltas, _) = drive(vec![NativePart::FunctionCallFragment {
            index: 0,
            id: None,
            name: Some("server__list".into()),
            arguments: String::new(),
        }])
        .await;

        match &deltas[0] {
            Delta::ToolCall(tc) => {
                assert_eq!(tc.call_id.len(), 8);
                assert_eq!(tc.arguments, "{}");
            }
            other => panic!("unexpected delta {other:?}"),
        }
    }

    #[tokio::test]
    async fn code_execution_parts_split_code_and_result() {
        let (deltas, _) = drive(vec![
            NativePart::ExecutableCode("print(1)".into()),
            NativePart::CodeExecutionResult("1\n".into()),
        ])
        .await;

        assert_eq!(
            deltas,
            vec![
                Delta::CodeExecution(CodeExecutionDelta {
                    code: "print(1)".into(),
                    result: String::new(),
                }),
                Delta::CodeExecution(CodeExecutionDelta {
                    code: String::new(),
                    result: "1\n".into(),
                }),
            ]
        );
    }

    #[tokio::test]
    async fn grounding_is_buffered_last_wins_and_precedes_usage() {
        let first = GroundingDelta {
            web_search_queries: vec!["old".into()],
            ..Default::default()
        };
        let last = GroundingDelta {
            web_search_queries: vec!["new".into()],
            ..Default::default()
        };
        let (deltas, _) = drive(vec![
            NativePart::Grounding(first),
            NativePart::Text("answer".into()),
            NativePart::Grounding(last.clone()),
            NativePart::Usage(UsageDelta::default()),
        ])
        .await;

        assert_eq!(deltas[0], Delta::Text("answer".into()));
        assert_eq!(deltas[1], Delta::Grounding(last));
        assert!(matches!(deltas[2], Delta::Usage(_)));
    }

    #[tokio::test]
    async fn empty_stream_is_retryable() {
        let (deltas, end) = drive(vec![]).await;
        assert!(deltas.is_empty());
        assert_eq!(
            end,
            AttemptEnd::Retryable("empty response from LLM (no content generated)".into())
        );
    }

    #[tokio::test]
    async fn usage_and_grounding_alone_do_not_count_as_content() {
        let (deltas, end) = drive(vec![
            NativePart::Usage(UsageDelta::default()),
            NativePart::Grounding(GroundingDelta::default()),
        ])
        .await;
        // Nothing escapes: the buffered metadata would otherwise defeat
        // the empty-stream retry.
        assert!(deltas.is_empty());
        assert!(matches!(end, AttemptEnd::Retryable(_)));
    }

    #[tokio::test]
    async fn stream_failure_is_fatal() {
        let parts: PartStream = Box::pin(stream::iter(vec![
            Ok(NativePart::Text("hi".into())),
            Err(ProviderFailure::provider("connection reset")),
        ]));
        let (deltas, end) = drive_with(parts, None).await;
        assert_eq!(deltas, vec![Delta::Text("hi".into())]);
        assert_eq!(
            end,
            AttemptEnd::Fatal(ProviderFailure::provider("connection reset"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_is_retryable() {
        let parts: PartStream = Box::pin(stream::pending());
        let mut items = Box::pin(drive_attempt(parts, Duration::from_secs(180), None));
        match items.next().await {
            Some(AttemptItem::End(AttemptEnd::Retryable(reason))) => {
                assert!(reason.contains("timed out after 180s"), "reason: {reason}");
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn partial_output_then_deadline_is_retryable_after_forwarding() {
        let parts: PartStream = Box::pin(
            stream::iter(vec![Ok(NativePart::Text("Partial".into()))]).chain(stream::pending()),
        );
        let (deltas, end) = drive_with(parts, None).await;
        assert_eq!(deltas, vec![Delta::Text("Partial".into())]);
        assert!(matches!(end, AttemptEnd::Retryable(_)));
    }

    #[tokio::test]
    async fn thought_signatures_land_in_the_cache() {
        let cache = Arc::new(SignatureCache::new());
        let sink = SignatureSink::new(Arc::clone(&cache), "exec-9");
        let (deltas, end) = drive_with(
            parts_stream(vec![
                NativePart::ThoughtSignature("sig-1".into()),
                NativePart::Text("ok".into()),
                NativePart::ThoughtSignature("sig-2".into()),
            ]),
            Some(sink),
        )
        .await;

        assert_eq!(deltas, vec![Delta::Text("ok".into())]);
        assert_eq!(end, AttemptEnd::Completed);
        assert_eq!(cache.get("exec-9").as_deref(), Some("sig-2"));
    }
}

//! Streaming response integrator.
//!
//! Turns a [`FragmentStream`] into discrete [`StreamEvent`]s and applies
//! them, in arrival order, to a [`ReplySink`]. Nothing is reordered or
//! batched: the final reply text is exactly the concatenation of the
//! fragments.

use futures::StreamExt;
use tracing::{debug, warn};

use crate::llm::FragmentStream;

/// One step of a streamed reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment(String),
    End,
    Fault(String),
}

/// Receiver of a streamed reply.
///
/// `append` returns false once the sink no longer accepts fragments (the
/// session was closed or the reply was abandoned); the integrator then stops
/// without finishing the reply.
pub trait ReplySink {
    fn append(&mut self, delta: &str) -> bool;
    fn complete(&mut self);
    fn fail(&mut self, reason: &str);
}

/// How an integration ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationOutcome {
    /// Stream ended normally
    Completed { fragments: usize },
    /// Stream raised a fault after `fragments` fragments
    Faulted { fragments: usize, reason: String },
    /// The sink detached before the stream finished
    Abandoned { fragments: usize },
}

/// Pull the next event from a fragment stream
pub async fn next_event(stream: &mut FragmentStream) -> StreamEvent {
    match stream.next().await {
        Some(Ok(fragment)) => StreamEvent::Fragment(fragment),
        Some(Err(e)) => StreamEvent::Fault(e.to_string()),
        None => StreamEvent::End,
    }
}

/// Drive `stream` to its end, applying every event to `sink`
pub async fn integrate<S: ReplySink>(mut stream: FragmentStream, sink: &mut S) -> IntegrationOutcome {
    let mut fragments = 0;
    loop {
        match next_event(&mut stream).await {
            StreamEvent::Fragment(delta) => {
                if !sink.append(&delta) {
                    debug!(fragments, "Reply sink detached, dropping stream");
                    return IntegrationOutcome::Abandoned { fragments };
                }
                fragments += 1;
            }
            StreamEvent::End => {
                sink.complete();
                return IntegrationOutcome::Completed { fragments };
            }
            StreamEvent::Fault(reason) => {
                warn!(fragments, "Reply stream faulted: {}", reason);
                sink.fail(&reason);
                return IntegrationOutcome::Faulted { fragments, reason };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ChatError, ChatResult};

    #[derive(Default)]
    struct RecordingSink {
        text: String,
        completed: bool,
        failure: Option<String>,
        accept_limit: Option<usize>,
        appended: usize,
    }

    impl ReplySink for RecordingSink {
        fn append(&mut self, delta: &str) -> bool {
            if self.accept_limit.is_some_and(|limit| self.appended >= limit) {
                return false;
            }
            self.appended += 1;
            self.text.push_str(delta);
            true
        }

        fn complete(&mut self) {
            self.completed = true;
        }

        fn fail(&mut self, reason: &str) {
            self.failure = Some(reason.to_string());
        }
    }

    fn stream_of(items: Vec<ChatResult<String>>) -> FragmentStream {
        Box::pin(futures::stream::iter(items))
    }

    #[tokio::test]
    async fn test_fragments_applied_in_order() {
        let stream = stream_of(vec![
            Ok("a".to_string()),
            Ok("b".to_string()),
            Ok("c".to_string()),
        ]);
        let mut sink = RecordingSink::default();

        let outcome = integrate(stream, &mut sink).await;
        assert_eq!(outcome, IntegrationOutcome::Completed { fragments: 3 });
        assert_eq!(sink.text, "abc");
        assert!(sink.completed);
    }

    #[tokio::test]
    async fn test_fault_keeps_partial_text() {
        let stream = stream_of(vec![
            Ok("par".to_string()),
            Ok("tial".to_string()),
            Err(ChatError::Transport("reset by peer".to_string())),
            Ok("never".to_string()),
        ]);
        let mut sink = RecordingSink::default();

        let outcome = integrate(stream, &mut sink).await;
        assert!(matches!(outcome, IntegrationOutcome::Faulted { fragments: 2, .. }));
        assert_eq!(sink.text, "partial");
        assert!(sink.failure.unwrap().contains("reset by peer"));
        assert!(!sink.completed);
    }

    #[tokio::test]
    async fn test_detached_sink_abandons_stream() {
        let stream = stream_of(vec![Ok("one".to_string()), Ok("two".to_string())]);
        let mut sink = RecordingSink {
            accept_limit: Some(1),
            ..Default::default()
        };

        let outcome = integrate(stream, &mut sink).await;
        assert_eq!(outcome, IntegrationOutcome::Abandoned { fragments: 1 });
        assert!(!sink.completed);
        assert!(sink.failure.is_none());
    }

    #[tokio::test]
    async fn test_empty_stream_completes() {
        let mut stream = stream_of(Vec::new());
        assert_eq!(next_event(&mut stream).await, StreamEvent::End);

        let mut sink = RecordingSink::default();
        let outcome = integrate(stream_of(Vec::new()), &mut sink).await;
        assert_eq!(outcome, IntegrationOutcome::Completed { fragments: 0 });
        assert!(sink.completed);
    }
}

//! Response handling for LLM generations.

use crate::{Error, FinishReason, StreamEvent, Usage};
use futures_util::stream::{Stream, StreamExt};
use std::pin::Pin;

/// Boxed stream of provider events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, Error>> + Send>>;

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteResponse {
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

/// Response from an LLM generation that can be streamed or buffered.
/// All responses are internally streaming.
pub struct Response {
    stream: EventStream,
}

impl Response {
    /// Create a new response from a stream of events.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<StreamEvent, Error>> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream),
        }
    }

    /// Stream the response events.
    pub fn stream(self) -> EventStream {
        self.stream
    }

    /// Buffer the entire response by consuming the stream.
    ///
    /// A body that ends without a `Done` event is treated as a normal stop.
    pub async fn buffer(mut self) -> Result<CompleteResponse, Error> {
        let mut content = String::new();
        let mut finish_reason = FinishReason::Stop;
        let mut usage = Usage::default();

        while let Some(event) = self.stream.next().await {
            match event? {
                StreamEvent::ContentDelta { delta } => content.push_str(&delta),
                StreamEvent::Done {
                    finish_reason: reason,
                    usage: reported,
                } => {
                    finish_reason = reason;
                    usage = reported;
                    break;
                }
                StreamEvent::Error { error } => return Err(Error::streaming(error)),
            }
        }

        Ok(CompleteResponse {
            content,
            finish_reason,
            usage,
        })
    }

    /// Get just the text content (convenience method).
    pub async fn text(self) -> Result<String, Error> {
        Ok(self.buffer().await?.content)
    }
}

/// Turn a filtered or truncated finish that produced no text into an error.
///
/// Without this the caller would see an empty answer that looks successful.
pub(crate) fn reject_empty_finish<S>(
    provider: &'static str,
    events: S,
) -> impl Stream<Item = Result<StreamEvent, Error>> + Send + 'static
where
    S: Stream<Item = Result<StreamEvent, Error>> + Send + 'static,
{
    events.scan(false, move |produced, event| {
        if let Ok(StreamEvent::ContentDelta { delta }) = &event {
            *produced |= !delta.is_empty();
        }
        let event = match event {
            Ok(StreamEvent::Done { finish_reason, .. })
                if !*produced && finish_reason != FinishReason::Stop =>
            {
                Err(Error::provider(
                    provider,
                    format!("response blocked/truncated: {}", finish_reason.as_str()),
                ))
            }
            other => other,
        };
        futures_util::future::ready(Some(event))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> Result<StreamEvent, Error> {
        Ok(StreamEvent::ContentDelta {
            delta: text.to_string(),
        })
    }

    #[tokio::test]
    async fn test_response_buffering() {
        let events = vec![
            delta("SELECT"),
            delta(" * FROM authors"),
            Ok(StreamEvent::Done {
                finish_reason: FinishReason::Stop,
                usage: Usage {
                    input_tokens: 12,
                    output_tokens: 5,
                },
            }),
        ];

        let response = Response::from_stream(futures_util::stream::iter(events));
        let complete = response.buffer().await.unwrap();
        assert_eq!(complete.content, "SELECT * FROM authors");
        assert_eq!(complete.finish_reason, FinishReason::Stop);
        assert_eq!(complete.usage.output_tokens, 5);
    }

    #[tokio::test]
    async fn test_text_without_done_event() {
        let events = vec![delta("SELECT 1")];
        let text = Response::from_stream(futures_util::stream::iter(events))
            .text()
            .await
            .unwrap();
        assert_eq!(text, "SELECT 1");
    }

    #[tokio::test]
    async fn test_error_event_fails_buffering() {
        let events = vec![
            delta("SEL"),
            Ok(StreamEvent::Error {
                error: "quota exhausted".to_string(),
            }),
        ];
        let err = Response::from_stream(futures_util::stream::iter(events))
            .text()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota exhausted"));
    }

    fn done(finish_reason: FinishReason) -> Result<StreamEvent, Error> {
        Ok(StreamEvent::Done {
            finish_reason,
            usage: Usage::default(),
        })
    }

    #[tokio::test]
    async fn test_empty_filtered_finish_is_an_error() {
        let events = futures_util::stream::iter(vec![delta(""), done(FinishReason::ContentFilter)]);
        let err = Response::from_stream(reject_empty_finish("Gemini", events))
            .text()
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Provider error: Gemini - response blocked/truncated: content_filter"
        );
    }

    #[tokio::test]
    async fn test_truncated_answer_with_text_is_kept() {
        let events = futures_util::stream::iter(vec![delta("SELECT TOP"), done(FinishReason::Length)]);
        let complete = Response::from_stream(reject_empty_finish("Gemini", events))
            .buffer()
            .await
            .unwrap();

        assert_eq!(complete.content, "SELECT TOP");
        assert_eq!(complete.finish_reason, FinishReason::Length);
    }

    #[tokio::test]
    async fn test_empty_normal_stop_is_not_an_error() {
        let events = futures_util::stream::iter(vec![done(FinishReason::Stop)]);
        let text = Response::from_stream(reject_empty_finish("OpenAI", events))
            .text()
            .await
            .unwrap();
        assert!(text.is_empty());
    }
}

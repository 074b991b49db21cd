use crate::error::RelayError;
use crate::relay::{open_upstream, record_failure};
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::de::IgnoredAny;
use std::io;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

/// Server-sent event lines, each terminated by `\n`.
pub type LineStream = BoxStream<'static, Bytes>;

const MAX_LINE_LENGTH: usize = 1024 * 1024;

type UpstreamLines = BoxStream<'static, Result<String, LinesCodecError>>;

enum State {
    Connecting(reqwest::RequestBuilder),
    Relaying(UpstreamLines),
    Finished,
}

pub(crate) fn relay_lines(pending: reqwest::RequestBuilder, timeout_after: Duration) -> LineStream {
    stream::unfold(State::Connecting(pending), move |state| async move {
        let lines = match state {
            State::Connecting(pending) => match connect(pending, timeout_after).await {
                Ok(lines) => lines,
                Err(e) => return Some((fail(&e), State::Finished)),
            },
            State::Relaying(lines) => lines,
            State::Finished => return None,
        };
        next_line(lines, timeout_after).await
    })
    .boxed()
}

async fn connect(
    pending: reqwest::RequestBuilder,
    timeout_after: Duration,
) -> Result<UpstreamLines, RelayError> {
    let response = open_upstream(pending, timeout_after, "stream").await?;
    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(io::Error::other));
    let lines = FramedRead::new(
        StreamReader::new(body),
        LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
    );
    Ok(lines.boxed())
}

/// Waits for the next non-empty upstream line, at most `timeout_after` per chunk.
async fn next_line(mut lines: UpstreamLines, timeout_after: Duration) -> Option<(Bytes, State)> {
    loop {
        let line = match timeout(timeout_after, lines.next()).await {
            Err(_) => return Some((fail(&RelayError::Timeout), State::Finished)),
            Ok(None) => return None,
            Ok(Some(Err(e))) => return Some((fail(&read_error(e)), State::Finished)),
            Ok(Some(Ok(line))) => line,
        };
        if line.is_empty() {
            continue;
        }

        warn_if_malformed(&line);
        let mut bytes = line.into_bytes();
        bytes.push(b'\n');
        return Some((Bytes::from(bytes), State::Relaying(lines)));
    }
}

fn read_error(error: LinesCodecError) -> RelayError {
    match error {
        LinesCodecError::MaxLineLengthExceeded => {
            RelayError::Other(format!("upstream line longer than {MAX_LINE_LENGTH} bytes"))
        }
        LinesCodecError::Io(e) => {
            match e.get_ref().and_then(|inner| inner.downcast_ref::<reqwest::Error>()) {
                Some(inner) => RelayError::from_reqwest(inner),
                None => RelayError::Other(e.to_string()),
            }
        }
    }
}

fn fail(error: &RelayError) -> Bytes {
    record_failure("stream", error);
    error_event(&error.stream_message())
}

pub(crate) fn error_event(message: &str) -> Bytes {
    let payload = serde_json::json!({ "error": message });
    Bytes::from(format!("data: {payload}\n\n"))
}

fn warn_if_malformed(line: &str) {
    let Some(payload) = line.strip_prefix("data:") else {
        return;
    };
    let payload = payload.trim();
    if payload != "[DONE]" && serde_json::from_str::<IgnoredAny>(payload).is_err() {
        tracing::warn!(line, "Forwarding malformed upstream event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_event_escapes_message() {
        let event = error_event("API请求失败: {\"error\": \"bad\nrequest\"}");
        assert_eq!(
            &event[..],
            "data: {\"error\":\"API请求失败: {\\\"error\\\": \\\"bad\\nrequest\\\"}\"}\n\n".as_bytes()
        );
    }

    #[test]
    fn test_read_error() {
        assert!(matches!(
            read_error(LinesCodecError::MaxLineLengthExceeded),
            RelayError::Other(_)
        ));
        let io_error = io::Error::new(io::ErrorKind::InvalidData, "stream did not contain valid UTF-8");
        match read_error(LinesCodecError::Io(io_error)) {
            RelayError::Other(message) => assert!(message.contains("UTF-8")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

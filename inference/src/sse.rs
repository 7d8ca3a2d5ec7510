//! Server-sent-event frame parsing for streaming completions.
//!
//! A line may span multiple physical reads, so splitting is a pure
//! function from `(carried buffer, new bytes)` to `(complete lines,
//! remainder)`. Only `\n`-terminated lines are released; the trailing
//! partial line is carried into the next read.

use serde::Deserialize;

/// Split buffered input into complete lines plus the retained remainder.
pub fn split_lines(buffer: String, incoming: &str) -> (Vec<String>, String) {
    let mut combined = buffer;
    combined.push_str(incoming);

    let mut lines: Vec<String> = combined.split('\n').map(str::to_owned).collect();
    // The final element is unterminated: keep it for the next read.
    let remainder = lines.pop().unwrap_or_default();
    (lines, remainder)
}

/// One decoded event frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Blank line, comment, or a malformed frame to recover from
    Skip,
    /// Terminator frame: `data: [DONE]`
    Done,
    /// Incremental text delta
    Delta(String),
}

#[derive(Deserialize)]
struct StreamPayload {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Decode a single complete line into a frame.
///
/// Malformed JSON is reported as `Skip` so one bad frame never aborts the
/// stream; the caller logs it and continues.
pub fn decode_frame(line: &str) -> Frame {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Frame::Skip;
    }
    if trimmed == "data: [DONE]" {
        return Frame::Done;
    }
    let Some(payload) = trimmed.strip_prefix("data: ") else {
        return Frame::Skip;
    };

    match serde_json::from_str::<StreamPayload>(payload) {
        Ok(parsed) => {
            let delta = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
                .unwrap_or_default();
            if delta.is_empty() {
                Frame::Skip
            } else {
                Frame::Delta(delta)
            }
        }
        Err(err) => {
            tracing::warn!(line = trimmed, error = %err, "skipping malformed stream frame");
            Frame::Skip
        }
    }
}

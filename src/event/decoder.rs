// src/event/decoder.rs

//! Output decoder.
//!
//! Every stdout emission of a test script is expected to be one complete
//! JSON record. Emissions that reach us together in one pipe read are split
//! on newlines; nothing is ever held back waiting for more bytes. Anything
//! else is diagnostic noise: it is reported as a [`DecodeError`] so the
//! caller can log and drop it. Stderr is never parsed; it always becomes a
//! `failed` event carrying the text verbatim.

use thiserror::Error;

use super::RunEvent;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty output chunk")]
    Empty,

    #[error("output chunk is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("output chunk is not a run event: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode one stdout chunk into a [`RunEvent`].
pub fn decode_stdout(chunk: &[u8]) -> Result<RunEvent, DecodeError> {
    let text = std::str::from_utf8(chunk)?;
    if text.trim().is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(serde_json::from_str(text)?)
}

/// Decode everything in one stdout read.
///
/// A chunk that is a record on its own yields that record. Otherwise every
/// non-blank line is decoded separately, in order.
pub fn decode_stdout_chunk(chunk: &[u8]) -> Vec<Result<RunEvent, DecodeError>> {
    match decode_stdout(chunk) {
        Ok(event) => vec![Ok(event)],
        Err(DecodeError::Empty) => vec![Err(DecodeError::Empty)],
        Err(_) if chunk.contains(&b'\n') => chunk
            .split(|b| *b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter(|line| !line.trim_ascii().is_empty())
            .map(decode_stdout)
            .collect(),
        Err(e) => vec![Err(e)],
    }
}

/// Turn one stderr chunk into a `failed` [`RunEvent`].
pub fn decode_stderr(chunk: &[u8]) -> RunEvent {
    RunEvent::failed(String::from_utf8_lossy(chunk))
}

//! Incremental decoding of the inference response body.
//!
//! Two wire formats are understood:
//!
//! - `data_stream`: one part per line, `<code>:<json>`. Code `0` is a text
//!   delta, `g` a reasoning delta, `3` an error string and `d` the finish
//!   message. Other codes are ignored.
//! - `text`: the body is the answer text itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StreamError;

/// Wire format of the inference response body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamProtocol {
    #[default]
    DataStream,
    Text,
}

impl std::str::FromStr for StreamProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data_stream" | "data" => Ok(StreamProtocol::DataStream),
            "text" => Ok(StreamProtocol::Text),
            other => Err(other.to_string()),
        }
    }
}

/// One decoded unit of the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPart {
    /// Answer text delta.
    Text(String),
    /// Reasoning delta delivered as its own channel.
    Reasoning(String),
    /// Error reported by the provider mid-stream.
    Error(String),
    /// The model finished.
    Finish { reason: Option<String> },
}

/// Parse one line of the data-stream protocol.
///
/// Returns `Ok(None)` for blank lines and unknown part codes.
pub fn parse_data_line(line: &str) -> Result<Option<StreamPart>, StreamError> {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return Ok(None);
    }

    let Some((code, payload)) = line.split_once(':') else {
        return Err(protocol_error(line, "missing part code"));
    };

    let part = match code {
        "0" => StreamPart::Text(parse_string(line, payload)?),
        "g" => StreamPart::Reasoning(parse_string(line, payload)?),
        "3" => StreamPart::Error(parse_string(line, payload)?),
        "d" => {
            let value: Value = serde_json::from_str(payload)
                .map_err(|e| protocol_error(line, &e.to_string()))?;
            StreamPart::Finish {
                reason: value
                    .get("finishReason")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(part))
}

fn parse_string(line: &str, payload: &str) -> Result<String, StreamError> {
    serde_json::from_str::<String>(payload).map_err(|e| protocol_error(line, &e.to_string()))
}

fn protocol_error(line: &str, message: &str) -> StreamError {
    StreamError::Protocol {
        line: line.chars().take(80).collect(),
        message: message.to_string(),
    }
}

/// Stateful decoder fed with raw body chunks.
///
/// Multi-byte UTF-8 sequences and lines split across chunks are held back
/// until the rest arrives.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    protocol: StreamProtocol,
    pending_bytes: Vec<u8>,
    line_buffer: String,
}

impl StreamDecoder {
    pub fn new(protocol: StreamProtocol) -> Self {
        Self {
            protocol,
            ..Self::default()
        }
    }

    /// Feed a body chunk, returning every part it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<StreamPart>, StreamError> {
        self.pending_bytes.extend_from_slice(chunk);
        let text = self.take_valid_utf8()?;
        if text.is_empty() {
            return Ok(Vec::new());
        }

        match self.protocol {
            StreamProtocol::Text => Ok(vec![StreamPart::Text(text)]),
            StreamProtocol::DataStream => {
                self.line_buffer.push_str(&text);
                let mut parts = Vec::new();
                while let Some(newline) = self.line_buffer.find('\n') {
                    let line: String = self.line_buffer.drain(..=newline).collect();
                    if let Some(part) = parse_data_line(line.trim_end_matches('\n'))? {
                        parts.push(part);
                    }
                }
                Ok(parts)
            }
        }
    }

    /// Flush at end of body. A trailing line without newline is parsed;
    /// a dangling partial UTF-8 sequence is an error.
    pub fn finish(&mut self) -> Result<Vec<StreamPart>, StreamError> {
        if !self.pending_bytes.is_empty() {
            self.pending_bytes.clear();
            return Err(StreamError::InvalidUtf8);
        }
        let rest = std::mem::take(&mut self.line_buffer);
        match self.protocol {
            StreamProtocol::Text => Ok(Vec::new()),
            StreamProtocol::DataStream => Ok(parse_data_line(&rest)?.into_iter().collect()),
        }
    }

    fn take_valid_utf8(&mut self) -> Result<String, StreamError> {
        let valid_up_to = match std::str::from_utf8(&self.pending_bytes) {
            Ok(_) => self.pending_bytes.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => return Err(StreamError::InvalidUtf8),
        };
        let valid: Vec<u8> = self.pending_bytes.drain(..valid_up_to).collect();
        String::from_utf8(valid).map_err(|_| StreamError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_line_codes() {
        assert_eq!(
            parse_data_line(r#"0:"Hello""#).unwrap(),
            Some(StreamPart::Text("Hello".to_string()))
        );
        assert_eq!(
            parse_data_line(r#"g:"pondering""#).unwrap(),
            Some(StreamPart::Reasoning("pondering".to_string()))
        );
        assert_eq!(
            parse_data_line(r#"3:"rate limited""#).unwrap(),
            Some(StreamPart::Error("rate limited".to_string()))
        );
        assert_eq!(
            parse_data_line(r#"d:{"finishReason":"stop","usage":{"promptTokens":3}}"#).unwrap(),
            Some(StreamPart::Finish {
                reason: Some("stop".to_string())
            })
        );
    }

    #[test]
    fn test_parse_data_line_ignores_unknown_and_blank() {
        assert_eq!(parse_data_line(r#"f:{"messageId":"m"}"#).unwrap(), None);
        assert_eq!(parse_data_line("").unwrap(), None);
        assert_eq!(parse_data_line("\r").unwrap(), None);
    }

    #[test]
    fn test_parse_data_line_rejects_malformed() {
        assert!(matches!(
            parse_data_line("no code here"),
            Err(StreamError::Protocol { .. })
        ));
        assert!(matches!(
            parse_data_line("0:not-json"),
            Err(StreamError::Protocol { .. })
        ));
    }

    #[test]
    fn test_decoder_reassembles_split_lines() {
        let mut decoder = StreamDecoder::new(StreamProtocol::DataStream);
        assert!(decoder.feed(b"0:\"Hi").unwrap().is_empty());
        let parts = decoder.feed(b" there\"\n0:\"!\"\n").unwrap();
        assert_eq!(
            parts,
            vec![
                StreamPart::Text("Hi there".to_string()),
                StreamPart::Text("!".to_string())
            ]
        );
    }

    #[test]
    fn test_decoder_reassembles_split_utf8() {
        let mut decoder = StreamDecoder::new(StreamProtocol::Text);
        let bytes = "héllo".as_bytes();
        // 'é' is two bytes; split between them
        let first = decoder.feed(&bytes[..2]).unwrap();
        let second = decoder.feed(&bytes[2..]).unwrap();
        assert_eq!(first, vec![StreamPart::Text("h".to_string())]);
        assert_eq!(second, vec![StreamPart::Text("éllo".to_string())]);
    }

    #[test]
    fn test_decoder_rejects_invalid_utf8() {
        let mut decoder = StreamDecoder::new(StreamProtocol::Text);
        assert_eq!(decoder.feed(&[0xff, b'a']), Err(StreamError::InvalidUtf8));
    }

    #[test]
    fn test_finish_parses_trailing_line_and_flags_partial_utf8() {
        let mut decoder = StreamDecoder::new(StreamProtocol::DataStream);
        decoder.feed(br#"d:{"finishReason":"length"}"#).unwrap();
        assert_eq!(
            decoder.finish().unwrap(),
            vec![StreamPart::Finish {
                reason: Some("length".to_string())
            }]
        );

        let mut decoder = StreamDecoder::new(StreamProtocol::Text);
        decoder.feed(&"é".as_bytes()[..1]).unwrap();
        assert_eq!(decoder.finish(), Err(StreamError::InvalidUtf8));
    }

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("text".parse::<StreamProtocol>(), Ok(StreamProtocol::Text));
        assert_eq!(
            "DATA_STREAM".parse::<StreamProtocol>(),
            Ok(StreamProtocol::DataStream)
        );
        assert!("sse".parse::<StreamProtocol>().is_err());
    }
}

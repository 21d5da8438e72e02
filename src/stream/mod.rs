//! Response-body decoding and reasoning extraction.

mod decoder;
mod reasoning;

pub use decoder::{parse_data_line, StreamDecoder, StreamPart, StreamProtocol};
pub use reasoning::{ExtractedContent, ReasoningExtractor};

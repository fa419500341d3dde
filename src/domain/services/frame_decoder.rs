#[cfg(test)]
#[path = "frame_decoder_test.rs"]
mod tests;

use std::io;

use bytes::Bytes;
use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;

use crate::domain::models::ChunkStream;
use crate::domain::models::Frame;
use crate::domain::models::ProtocolParseError;

pub const DATA_PREFIX: &str = "data:";
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

pub type DecodedFrame = Result<Frame, ProtocolParseError>;
pub type FrameStream = FramedRead<StreamReader<ChunkStream, Bytes>, FrameDecoder>;

/// Returns the index where the first blank line at or after `from` starts,
/// and how many bytes the delimiter spans.
fn find_boundary(src: &[u8], from: usize) -> Option<(usize, usize)> {
    for idx in from..src.len() {
        if src[idx..].starts_with(b"\n\n") {
            return Some((idx, 2));
        }
        if src[idx..].starts_with(b"\r\n\r\n") {
            return Some((idx, 4));
        }
    }

    return None;
}

/// Parses one delimited block. `None` means the block carried nothing to
/// decode (comments, keep-alives, empty payloads).
fn parse_block(block: &[u8]) -> Option<DecodedFrame> {
    let text = String::from_utf8_lossy(block);
    let data_line = text
        .lines()
        .map(|line| return line.trim_end_matches('\r'))
        .find(|line| return line.starts_with(DATA_PREFIX))?;

    let payload = data_line[DATA_PREFIX.len()..].trim();
    if payload.is_empty() {
        return None;
    }

    let res = serde_json::from_str::<Frame>(payload).map_err(|err| {
        return ProtocolParseError {
            reason: err.to_string(),
            payload: payload.to_string(),
        };
    });

    return Some(res);
}

/// Splits an event stream into frames. Partial frames stay buffered until
/// their terminating blank line arrives, up to `max_frame_size` bytes.
#[derive(Debug)]
pub struct FrameDecoder {
    // Bytes already searched for a boundary.
    scanned: usize,
    max_frame_size: usize,
}

impl Default for FrameDecoder {
    fn default() -> FrameDecoder {
        return FrameDecoder::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE);
    }
}

impl FrameDecoder {
    pub fn with_max_frame_size(max_frame_size: usize) -> FrameDecoder {
        return FrameDecoder {
            scanned: 0,
            max_frame_size,
        };
    }
}

impl Decoder for FrameDecoder {
    type Item = DecodedFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<DecodedFrame>, io::Error> {
        // A delimiter may straddle the previous scan's end by up to three bytes.
        while let Some((end, delimiter_len)) = find_boundary(src, self.scanned.saturating_sub(3)) {
            self.scanned = 0;
            let block = src.split_to(end + delimiter_len);
            if let Some(decoded) = parse_block(&block[..end]) {
                return Ok(Some(decoded));
            }
        }

        if src.len() > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Stream frame exceeds the maximum size of {} bytes",
                    self.max_frame_size
                ),
            ));
        }
        self.scanned = src.len();

        return Ok(None);
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<DecodedFrame>, io::Error> {
        if let Some(decoded) = self.decode(src)? {
            return Ok(Some(decoded));
        }

        if src.is_empty() {
            return Ok(None);
        }

        self.scanned = 0;
        let block = src.split_to(src.len());
        return Ok(parse_block(&block));
    }
}

/// Wraps a raw response body into a lazy, ordered sequence of frames.
pub fn decode_frames(stream: ChunkStream) -> FrameStream {
    return FramedRead::new(StreamReader::new(stream), FrameDecoder::default());
}

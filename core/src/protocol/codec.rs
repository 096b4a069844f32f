//! Length-prefixed framing for SSPQ messages.
//!
//! ```text
//! +--------+------+---------+-------------+---------+
//! | "SSPQ" | type | retries | payload len | payload |
//! |   4    |  1   |    1    |   4 (BE)    |    n    |
//! +--------+------+---------+-------------+---------+
//! ```

use super::message::{Message, MessageType};
use bytes::{Buf, BufMut, BytesMut};
use std::io::Cursor;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

pub const MAGIC: &[u8; 4] = b"SSPQ";
pub const HEADER_LEN: usize = 10;
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum SspqCodecError {
    #[error("Invalid frame magic: {0:02x?}")]
    InvalidMagic([u8; 4]),

    #[error("Frame payload of {size} bytes exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Stream ended in the middle of a frame ({0} bytes buffered)")]
    Truncated(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SspqCodecError>;

#[derive(Debug, Clone)]
pub struct SspqCodec {
    max_frame_size: usize,
}

impl SspqCodec {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for SspqCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for SspqCodec {
    type Item = Message;
    type Error = SspqCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < HEADER_LEN {
            // Reject garbage as soon as the magic is visible
            let seen = src.len().min(MAGIC.len());
            if src[..seen] != MAGIC[..seen] {
                let mut magic = [0u8; 4];
                magic[..seen].copy_from_slice(&src[..seen]);
                return Err(SspqCodecError::InvalidMagic(magic));
            }
            return Ok(None);
        }

        // Peek at the header without consuming bytes
        let (magic, type_code, retries, payload_len) = {
            let mut cursor = Cursor::new(src.as_ref());
            let mut magic = [0u8; 4];
            cursor.copy_to_slice(&mut magic);
            let type_code = cursor.get_u8();
            let retries = cursor.get_u8();
            let payload_len = cursor.get_u32() as usize;
            (magic, type_code, retries, payload_len)
        };

        if &magic != MAGIC {
            return Err(SspqCodecError::InvalidMagic(magic));
        }

        if payload_len > self.max_frame_size {
            return Err(SspqCodecError::FrameTooLarge {
                size: payload_len,
                max: self.max_frame_size,
            });
        }

        let total_len = HEADER_LEN + payload_len;
        if src.len() < total_len {
            src.reserve(total_len - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total_len);
        frame.advance(HEADER_LEN);
        let message = Message::new(MessageType::from_code(type_code), frame.freeze(), retries);

        debug!(
            "SspqCodec: decoded {} frame, {} payload bytes",
            message.message_type,
            message.payload.len()
        );
        Ok(Some(message))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(buf)? {
            Some(message) => Ok(Some(message)),
            None if buf.is_empty() => Ok(None),
            None => Err(SspqCodecError::Truncated(buf.len())),
        }
    }
}

impl Encoder<Message> for SspqCodec {
    type Error = SspqCodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        <Self as Encoder<&Message>>::encode(self, &item, dst)
    }
}

impl Encoder<&Message> for SspqCodec {
    type Error = SspqCodecError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<()> {
        let payload_len = item.payload.len();
        if payload_len > self.max_frame_size {
            return Err(SspqCodecError::FrameTooLarge {
                size: payload_len,
                max: self.max_frame_size,
            });
        }

        dst.reserve(HEADER_LEN + payload_len);
        dst.put_slice(MAGIC);
        dst.put_u8(item.message_type.code());
        dst.put_u8(item.retries);
        dst.put_u32(payload_len as u32);
        dst.extend_from_slice(&item.payload);
        Ok(())
    }
}

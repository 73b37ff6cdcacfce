// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire framing.
//!
//! Every message crosses the transport as one frame:
//!
//! ```text
//! +----------+-----------+----------------+------------------+
//! | category | id        | body_size      | body             |
//! | u8       | u16 LE    | u32 LE         | body_size bytes  |
//! +----------+-----------+----------------+------------------+
//! ```
//!
//! The header is exactly [`FRAME_HEADER_SIZE`] (7) bytes. The decoder is
//! incremental: feed it whatever the socket produced and it yields zero
//! or more complete messages, constructed through the message factory
//! and filled in via `deserialize`.
//!
//! A body that fails `deserialize` is logged and counted, and the stream
//! resynchronizes on the next frame (the framing itself is still intact).
//! A `body_size` above the configured maximum is a protocol violation
//! and surfaces as [`Error::MessageTooLarge`]; the caller should close
//! the session.

use crate::error::{Error, Result};
use crate::message::{create_message, Category, Message, MessageId};

/// Fixed frame header size: category (1) + id (2) + body_size (4).
pub const FRAME_HEADER_SIZE: usize = 7;

/// Default maximum accepted body size (bytes).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Message category.
    pub category: Category,
    /// Message id.
    pub id: MessageId,
    /// Body length in bytes.
    pub body_size: u32,
}

impl FrameHeader {
    /// Parse a header from exactly [`FRAME_HEADER_SIZE`] bytes.
    #[must_use]
    pub fn parse(bytes: &[u8; FRAME_HEADER_SIZE]) -> Self {
        Self {
            category: bytes[0],
            id: u16::from_le_bytes([bytes[1], bytes[2]]),
            body_size: u32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]),
        }
    }

    /// Encode the header into its wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; FRAME_HEADER_SIZE] {
        let id = self.id.to_le_bytes();
        let size = self.body_size.to_le_bytes();
        [self.category, id[0], id[1], size[0], size[1], size[2], size[3]]
    }
}

/// Serialize a message into one complete wire frame.
pub fn encode_frame(msg: &dyn Message) -> Result<Vec<u8>> {
    let body = msg.serialize()?;
    let header = FrameHeader {
        category: msg.category(),
        id: msg.id(),
        body_size: body.len() as u32,
    };

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + body.len());
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Incremental frame decoder.
///
/// Maintains partial-read state across `feed` calls so it can sit
/// directly on a streaming transport.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_body_size: usize,
    frames_decoded: u64,
    decode_errors: u64,
}

impl FrameDecoder {
    /// Create a decoder with a custom body-size cap.
    #[must_use]
    pub fn new(max_body_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_body_size,
            frames_decoded: 0,
            decode_errors: 0,
        }
    }

    /// Create a decoder with the default cap.
    #[must_use]
    pub fn with_default_max() -> Self {
        Self::new(DEFAULT_MAX_BODY_SIZE)
    }

    /// Feed received bytes; returns every message completed by them.
    ///
    /// Messages whose body fails to deserialize are dropped (logged and
    /// counted); the error return is reserved for protocol violations
    /// that should close the session.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Box<dyn Message>>> {
        self.buffer.extend_from_slice(bytes);

        let mut messages = Vec::new();
        loop {
            if self.buffer.len() < FRAME_HEADER_SIZE {
                break;
            }

            let mut header_bytes = [0u8; FRAME_HEADER_SIZE];
            header_bytes.copy_from_slice(&self.buffer[..FRAME_HEADER_SIZE]);
            let header = FrameHeader::parse(&header_bytes);

            let body_size = header.body_size as usize;
            if body_size > self.max_body_size {
                return Err(Error::MessageTooLarge { size: body_size, max: self.max_body_size });
            }

            let frame_len = FRAME_HEADER_SIZE + body_size;
            if self.buffer.len() < frame_len {
                break;
            }

            let body = &self.buffer[FRAME_HEADER_SIZE..frame_len];
            let mut msg = create_message(header.category, header.id);
            match msg.deserialize(body) {
                Ok(()) => {
                    self.frames_decoded += 1;
                    messages.push(msg);
                }
                Err(e) => {
                    self.decode_errors += 1;
                    log::warn!(
                        "failed to deserialize message: category={} id={}: {}",
                        header.category,
                        header.id,
                        e
                    );
                }
            }

            self.buffer.drain(..frame_len);
        }

        Ok(messages)
    }

    /// Bytes buffered waiting for the rest of a frame.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Frames decoded successfully.
    #[must_use]
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Frames whose body failed to deserialize.
    #[must_use]
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_default_max()
    }
}

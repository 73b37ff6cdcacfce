// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared test message types.

use std::any::Any;

use hmux::{Message, MessageMeta, MessageTag, Result};

/// Route `log` output through the test harness; safe to call repeatedly.
#[allow(dead_code)]
pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Test message carrying a single little-endian `u32` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueMessage {
    meta: MessageMeta,
    pub value: u32,
}

impl ValueMessage {
    pub fn new(value: u32) -> Self {
        Self { meta: MessageMeta::new(Self::CATEGORY, Self::ID), value }
    }
}

impl Default for ValueMessage {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Message for ValueMessage {
    fn meta(&self) -> &MessageMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut MessageMeta {
        &mut self.meta
    }
    fn name(&self) -> &str {
        "ValueMessage"
    }
    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(self.value.to_le_bytes().to_vec())
    }
    fn deserialize(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != 4 {
            return Err(hmux::Error::InvalidMessage(format!(
                "ValueMessage body must be 4 bytes, got {}",
                data.len()
            )));
        }
        let mut buf = [0u8; 4];
        buf.copy_from_slice(data);
        self.value = u32::from_le_bytes(buf);
        Ok(())
    }
    fn clone_message(&self) -> Box<dyn Message> {
        Box::new(self.clone())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl MessageTag for ValueMessage {
    const CATEGORY: u8 = 9;
    const ID: u16 = 1;
}

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

use xattrwatch_common::{XattrEvent, EVENT_SIZE};

use crate::{argf, format_helpers::format_field, formatting::Formatter};

/// A record as read off one CPU's perf buffer.
#[derive(Clone, Copy, Debug)]
pub struct Delivery {
    pub cpu: u32,
    pub event: XattrEvent,
}

/// Decodes one perf sample. The kernel pads raw samples to 8 bytes, so anything past the record
/// is ignored; a short sample is rejected.
pub fn decode_event(sample: &[u8]) -> Option<XattrEvent> {
    if sample.len() < EVENT_SIZE {
        return None;
    }

    Some(unsafe { std::ptr::read_unaligned(sample.as_ptr() as *const XattrEvent) })
}

pub async fn handle_event(delivery: &Delivery, formatter: Formatter<'_>) -> anyhow::Result<()> {
    let event = &delivery.event;

    let mut rf = formatter.push_record(delivery.cpu, "xattr").await?;
    argf!(rf, "path: {}", format_field(&event.path));
    argf!(rf, "name: {}", format_field(&event.name));
    argf!(rf, "value: {}", format_field(&event.value));
    rf.finish().await?;

    Ok(())
}

#[cfg(test)]
mod test;

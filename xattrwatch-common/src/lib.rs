// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

#![cfg_attr(not(test), no_std)]

pub mod pipeline;

/// Capacity of each captured string, terminator included.
pub const FIELD_SIZE: usize = 50;

/// Maximum number of in-flight calls tracked by the `STORAGE` map.
pub const PENDING_MAX_ENTRIES: u32 = 4096;

/// Size of one record on the perf channel.
pub const EVENT_SIZE: usize = core::mem::size_of::<XattrEvent>();

/// Arguments of `setxattr`/`lsetxattr` as captured on entry. Each field is a NUL-terminated
/// string truncated to `FIELD_SIZE - 1` bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XattrEvent {
    pub path: [u8; FIELD_SIZE],
    pub name: [u8; FIELD_SIZE],
    pub value: [u8; FIELD_SIZE],
}

const _: () = assert!(EVENT_SIZE == 3 * FIELD_SIZE);

impl XattrEvent {
    pub const fn zeroed() -> Self {
        XattrEvent {
            path: [0; FIELD_SIZE],
            name: [0; FIELD_SIZE],
            value: [0; FIELD_SIZE],
        }
    }
}

impl Default for XattrEvent {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for XattrEvent {}

/// Packs a thread identity the same way `bpf_get_current_pid_tgid()` does: tgid in the upper
/// half, tid in the lower half.
#[inline(always)]
pub const fn pending_key(tgid: u32, tid: u32) -> u64 {
    ((tgid as u64) << 32) | tid as u64
}

/// Returns the bytes of a captured field up to, not including, the first NUL.
pub fn field_bytes(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

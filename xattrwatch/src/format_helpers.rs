// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

use xattrwatch_common::{field_bytes, FIELD_SIZE};

/// Renders a captured field as a quoted string. A field that used the whole buffer may have been
/// cut short by the probe, which cannot tell a 49-byte argument from a longer one.
pub fn format_field(field: &[u8]) -> String {
    let bytes = field_bytes(field);
    let s = String::from_utf8_lossy(bytes);

    if bytes.len() >= FIELD_SIZE - 1 {
        format!("{s:?} ... (possibly truncated)")
    } else {
        format!("{s:?}")
    }
}

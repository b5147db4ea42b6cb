// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

#![no_std]

// Empty library target so `xattrwatch` can name this crate as a build-dependency; the probe
// itself is the `xattrwatch` binary in main.rs.

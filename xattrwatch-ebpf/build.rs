// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

use which::which;

/// rustc links the probe with `bpf-linker`, which cargo knows nothing about. Key the build on
/// the linker binary's mtime so swapping linkers forces a rebuild of the probe object.
fn main() {
    match which("bpf-linker") {
        Ok(bpf_linker) => println!("cargo:rerun-if-changed={}", bpf_linker.display()),
        Err(e) => println!("cargo:warning=bpf-linker not found in PATH: {e}"),
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

fn main() -> anyhow::Result<()> {
    // Produces $OUT_DIR/xattrwatch, embedded by main.rs.
    aya_build::build_ebpf(
        [aya_build::Package {
            name: "xattrwatch-ebpf",
            root_dir: "../xattrwatch-ebpf",
            no_default_features: false,
            features: &[],
        }],
        aya_build::Toolchain::default(),
    )?;

    Ok(())
}

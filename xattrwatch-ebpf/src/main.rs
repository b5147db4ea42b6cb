// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

#![no_std]
#![no_main]
#![allow(static_mut_refs)]
use aya_ebpf::{
    macros::{map, tracepoint},
    maps::{HashMap, PerfEventArray},
    programs::TracePointContext,
    EbpfContext as _,
};
use aya_log_ebpf::{error, trace};
use xattrwatch_common::{
    pipeline::{self, ExitOutcome},
    XattrEvent, PENDING_MAX_ENTRIES,
};

mod util;

// Records captured on entry, keyed by pid_tgid until the matching exit.
#[map]
static mut STORAGE: HashMap<u64, XattrEvent> = HashMap::with_max_entries(PENDING_MAX_ENTRIES, 0);

#[map]
static mut EVENTS: PerfEventArray<XattrEvent> = PerfEventArray::new(0);

// setxattr(2) and lsetxattr(2) share the (path, name, value, size, flags) argument list, so
// both pairs of tracepoints run the same hooks.

#[tracepoint]
pub fn sys_enter_setxattr(ctx: TracePointContext) -> u32 {
    xattr_enter(&ctx)
}

#[tracepoint]
pub fn sys_exit_setxattr(ctx: TracePointContext) -> u32 {
    xattr_exit(&ctx)
}

#[tracepoint]
pub fn sys_enter_lsetxattr(ctx: TracePointContext) -> u32 {
    xattr_enter(&ctx)
}

#[tracepoint]
pub fn sys_exit_lsetxattr(ctx: TracePointContext) -> u32 {
    xattr_exit(&ctx)
}

#[inline(always)]
fn xattr_enter(ctx: &TracePointContext) -> u32 {
    fn inner(ctx: &TracePointContext) -> Result<(), u32> {
        let args = util::get_enter_args(ctx)?;
        let key = util::current_key();

        if let Err(err) = pipeline::on_enter(&util::ProbeRead, &util::PendingMap, key, &args) {
            error!(
                ctx,
                "Failed to store pending xattr call (tid {}, tgid {}). Error code: {}",
                ctx.pid(),
                ctx.tgid(),
                err
            );
            return Err(1);
        }

        Ok(())
    }

    // The entry side only records intent; whatever happened, the traced call goes on.
    let _ = inner(ctx);
    0
}

#[inline(always)]
fn xattr_exit(ctx: &TracePointContext) -> u32 {
    fn inner(ctx: &TracePointContext) -> Result<u32, u32> {
        let return_value = util::get_return_value(ctx)?;
        let key = util::current_key();

        let outcome = pipeline::on_exit(
            &util::PendingMap,
            &util::PerfChannel::new(ctx),
            key,
            return_value,
        );

        match outcome {
            ExitOutcome::Emitted => {}
            ExitOutcome::EmittedStale { err } => {
                trace!(ctx, "failed to remove pending xattr call (tid {}): {}", ctx.pid(), err);
            }
            ExitOutcome::Discarded { ret } => {
                trace!(ctx, "xattr call failed with {} (tid {})", ret, ctx.pid());
            }
            ExitOutcome::Unmatched => {
                trace!(ctx, "no pending xattr call for tid {}", ctx.pid());
            }
        }

        Ok(outcome.code())
    }
    match inner(ctx) {
        Ok(ret) => ret,
        Err(ret) => ret,
    }
}

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

#[link_section = "license"]
#[no_mangle]
static LICENSE: [u8; 13] = *b"Dual MIT/GPL\0";

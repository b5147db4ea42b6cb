// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

//! Correlation of the entry and exit of one `setxattr`/`lsetxattr` call.
//!
//! The entry side copies the three string arguments into a record and parks it under the
//! calling thread's key. The exit side publishes that record only when the call returned 0.
//! Everything here works on fixed-size stack data and runs in bounded time, so the probe
//! programs call straight into it.
//!
//! A failed call does not remove its parked record: it stays in the store until the same
//! thread enters one of these syscalls again. See [`ExitOutcome::leaves_pending`].

use crate::{XattrEvent, FIELD_SIZE};

/// User-space pointers taken from the first three syscall arguments.
#[derive(Clone, Copy, Debug)]
pub struct EnterArgs {
    pub path: *const u8,
    pub name: *const u8,
    pub value: *const u8,
}

/// Access to the traced process's memory.
pub trait UserMemory {
    /// Copies the NUL-terminated string at `src` into `dst`, stopping after `FIELD_SIZE - 1`
    /// bytes. Returns the number of bytes written, terminator included.
    fn read_str(&self, src: *const u8, dst: &mut [u8; FIELD_SIZE]) -> Result<usize, i64>;
}

/// The keyed table bridging entry and exit.
pub trait PendingStore {
    /// Inserts the record, replacing any record already stored under `key`.
    fn insert(&self, key: u64, event: &XattrEvent) -> Result<(), i64>;

    /// Runs `f` against the record stored under `key`, if any.
    fn lookup<R>(&self, key: u64, f: impl FnOnce(&XattrEvent) -> R) -> Option<R>;

    fn remove(&self, key: u64) -> Result<(), i64>;
}

/// The completed-event channel. Publishing never blocks and may drop the record.
pub trait EventChannel {
    fn publish(&self, event: &XattrEvent);
}

/// Where a key is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallState {
    Pending,
    Emitted,
    Discarded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The call succeeded; its record was published and the key removed.
    Emitted,
    /// The record was published but deleting the key failed with `err`, so it is still stored.
    EmittedStale { err: i64 },
    /// The call failed with `ret`. Nothing was published and the store was not touched.
    Discarded { ret: i64 },
    /// The call succeeded but nothing was pending for this thread.
    Unmatched,
}

impl ExitOutcome {
    pub fn state(&self) -> CallState {
        match self {
            ExitOutcome::Emitted | ExitOutcome::EmittedStale { .. } => CallState::Emitted,
            ExitOutcome::Discarded { .. } | ExitOutcome::Unmatched => CallState::Discarded,
        }
    }

    /// True when the exit left a record behind in the store.
    pub fn leaves_pending(&self) -> bool {
        matches!(
            self,
            ExitOutcome::Discarded { .. } | ExitOutcome::EmittedStale { .. }
        )
    }

    /// Return value for the exit program.
    pub fn code(&self) -> u32 {
        match self {
            ExitOutcome::Emitted | ExitOutcome::EmittedStale { .. } => 0,
            _ => 1,
        }
    }
}

#[inline(always)]
fn read_field<M: UserMemory>(mem: &M, src: *const u8, dst: &mut [u8; FIELD_SIZE]) {
    if mem.read_str(src, dst).is_err() {
        *dst = [0; FIELD_SIZE];
    }
    dst[FIELD_SIZE - 1] = 0;
}

/// Builds a record from the entry arguments. A field whose read fails is left empty.
#[inline(always)]
pub fn capture<M: UserMemory>(mem: &M, args: &EnterArgs) -> XattrEvent {
    let mut event = XattrEvent::zeroed();

    read_field(mem, args.path, &mut event.path);
    read_field(mem, args.name, &mut event.name);
    read_field(mem, args.value, &mut event.value);

    event
}

/// Entry hook: captures the arguments and parks the record under `key`.
#[inline(always)]
pub fn on_enter<M: UserMemory, S: PendingStore>(
    mem: &M,
    store: &S,
    key: u64,
    args: &EnterArgs,
) -> Result<CallState, i64> {
    let event = capture(mem, args);
    store.insert(key, &event)?;
    Ok(CallState::Pending)
}

/// Exit hook: publishes the parked record for `key` if the call returned 0.
#[inline(always)]
pub fn on_exit<S: PendingStore, C: EventChannel>(
    store: &S,
    channel: &C,
    key: u64,
    return_value: i64,
) -> ExitOutcome {
    if return_value != 0 {
        return ExitOutcome::Discarded { ret: return_value };
    }

    if store.lookup(key, |event| channel.publish(event)).is_none() {
        return ExitOutcome::Unmatched;
    }

    match store.remove(key) {
        Ok(()) => ExitOutcome::Emitted,
        Err(err) => ExitOutcome::EmittedStale { err },
    }
}

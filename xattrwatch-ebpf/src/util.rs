use aya_ebpf::{
    bindings::BPF_ANY,
    helpers::{bpf_get_current_pid_tgid, bpf_probe_read_user_str_bytes},
    programs::TracePointContext,
};
use xattrwatch_common::{
    pipeline::{EnterArgs, EventChannel, PendingStore, UserMemory},
    XattrEvent, FIELD_SIZE,
};

use crate::{EVENTS, STORAGE};

// /sys/kernel/debug/tracing/events/syscalls/sys_enter_setxattr/format
//
// 	field:int __syscall_nr;	offset:8;	size:4;	signed:1;
// 	field:const char * pathname;	offset:16;	size:8;	signed:0;
// 	field:const char * name;	offset:24;	size:8;	signed:0;
// 	field:const void * value;	offset:32;	size:8;	signed:0;
// 	field:size_t size;	offset:40;	size:8;	signed:0;
// 	field:int flags;	offset:48;	size:8;	signed:0;
//
// sys_enter_lsetxattr has the same layout.
const SYSCALL_ARGS_OFFSET: usize = 16;

// /sys/kernel/debug/tracing/events/syscalls/sys_exit_setxattr/format
//
// 	field:int __syscall_nr;	offset:8;	size:4;	signed:1;
// 	field:long ret;	offset:16;	size:8;	signed:1;
const SYSCALL_RETURN_OFFSET: usize = 16;

#[inline(always)]
pub fn get_enter_args(ctx: &TracePointContext) -> Result<EnterArgs, u32> {
    let args = unsafe {
        ctx.read_at::<[usize; 3]>(SYSCALL_ARGS_OFFSET)
            .map_err(|e| e as u32)?
    };

    Ok(EnterArgs {
        path: args[0] as *const u8,
        name: args[1] as *const u8,
        value: args[2] as *const u8,
    })
}

#[inline(always)]
pub fn get_return_value(ctx: &TracePointContext) -> Result<i64, u32> {
    Ok(unsafe {
        ctx.read_at::<i64>(SYSCALL_RETURN_OFFSET)
            .map_err(|_| 1u32)?
    })
}

#[inline(always)]
pub fn current_key() -> u64 {
    bpf_get_current_pid_tgid()
}

pub struct ProbeRead;

impl UserMemory for ProbeRead {
    #[inline(always)]
    fn read_str(&self, src: *const u8, dst: &mut [u8; FIELD_SIZE]) -> Result<usize, i64> {
        unsafe { bpf_probe_read_user_str_bytes(src, dst) }
            .map(|s| s.len() + 1)
            .map_err(|e| e as i64)
    }
}

pub struct PendingMap;

impl PendingStore for PendingMap {
    #[inline(always)]
    fn insert(&self, key: u64, event: &XattrEvent) -> Result<(), i64> {
        unsafe { STORAGE.insert(&key, event, BPF_ANY as u64) }.map_err(|e| e as i64)
    }

    #[inline(always)]
    fn lookup<R>(&self, key: u64, f: impl FnOnce(&XattrEvent) -> R) -> Option<R> {
        unsafe { STORAGE.get(&key) }.map(f)
    }

    #[inline(always)]
    fn remove(&self, key: u64) -> Result<(), i64> {
        unsafe { STORAGE.remove(&key) }.map_err(|e| e as i64)
    }
}

pub struct PerfChannel<'a> {
    ctx: &'a TracePointContext,
}

impl<'a> PerfChannel<'a> {
    pub fn new(ctx: &'a TracePointContext) -> Self {
        PerfChannel { ctx }
    }
}

impl EventChannel for PerfChannel<'_> {
    #[inline(always)]
    fn publish(&self, event: &XattrEvent) {
        unsafe { EVENTS.output(self.ctx, event, 0) };
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

use std::{pin::Pin, sync::Arc};

use anyhow::anyhow;
use aya::{
    maps::{perf::AsyncPerfEventArray, HashMap},
    programs::TracePoint,
    Ebpf,
};
use bytes::BytesMut;
use clap::Parser;
use log::{debug, trace, warn};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt as _},
    signal,
    sync::{
        mpsc::{channel, Receiver, Sender},
        Notify,
    },
    task::JoinHandle,
};
use xattrwatch_common::{XattrEvent, EVENT_SIZE};

use crate::{
    events::{decode_event, handle_event, Delivery},
    formatting::{Formatter, FormattingStyle},
};

mod events;
mod format_helpers;
mod formatting;

const TRACEPOINTS: &[&str] = &[
    "sys_enter_setxattr",
    "sys_exit_setxattr",
    "sys_enter_lsetxattr",
    "sys_exit_lsetxattr",
];

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    // Formatting style, `one-line` or `multi-line`
    #[arg(long = "format", value_enum, default_value_t = FormattingStyle::default())]
    style: FormattingStyle,

    /// Exit after printing this many records
    #[arg(short = 'n', long = "count", value_parser = clap::value_parser!(u64).range(1..))]
    count: Option<u64>,

    /// Pages per CPU for the perf buffers (power of two)
    #[arg(long = "pages", value_parser = parse_pages)]
    pages: Option<usize>,
}

fn parse_pages(s: &str) -> Result<usize, String> {
    let pages: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid page count"))?;
    if !pages.is_power_of_two() {
        return Err(format!("page count must be a power of two, got {pages}"));
    }
    Ok(pages)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    // Bump the memlock rlimit. This is needed for older kernels that don't use the
    // new memcg based accounting, see https://lwn.net/Articles/837122/
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        debug!("remove limit on locked memory failed, ret is: {ret}");
    }

    let mut ebpf = aya::Ebpf::load(aya::include_bytes_aligned!(concat!(
        env!("OUT_DIR"),
        "/xattrwatch"
    )))?;
    if let Err(e) = aya_log::EbpfLogger::init(&mut ebpf) {
        // This can happen if you remove all log statements from your eBPF program.
        warn!("failed to initialize eBPF logger: {e}");
    }

    attach_tracepoints(&mut ebpf)?;

    let shutdown = Arc::new(Notify::new());

    // One reader per CPU buffer feeds the channel, a single writer drains it to stdout.
    let (tx, rx) = channel(128);
    spawn_event_readers(&mut ebpf, tx, args.pages, shutdown.clone())?;
    let mut writer = spawn_event_writer(rx, args.style, args.count);

    let ctrl_c = signal::ctrl_c();

    println!("Waiting for Ctrl-C...");
    tokio::select! {
        result = ctrl_c => {
            eprintln!("Ctrl-C received...");
            result?;
        },
        _ = &mut writer => trace!("writer finished"),
    };

    shutdown.notify_waiters();

    report_pending(&ebpf);

    println!("Exiting...");

    Ok(())
}

fn attach_tracepoints(ebpf: &mut Ebpf) -> anyhow::Result<()> {
    for &name in TRACEPOINTS {
        let program: &mut TracePoint = ebpf
            .program_mut(name)
            .ok_or_else(|| anyhow!("program {name} not found"))?
            .try_into()?;
        program.load()?;
        program.attach("syscalls", name)?;
        trace!("attached syscalls/{name}");
    }
    Ok(())
}

fn spawn_event_readers(
    ebpf: &mut Ebpf,
    tx: Sender<Delivery>,
    pages: Option<usize>,
    shutdown: Arc<Notify>,
) -> anyhow::Result<()> {
    let mut events = AsyncPerfEventArray::try_from(
        ebpf.take_map("EVENTS")
            .ok_or_else(|| anyhow!("EVENTS map not found"))?,
    )?;
    let cpus = aya::util::online_cpus().map_err(|e| anyhow!("online_cpus: {:?}", e))?;
    for cpu in cpus {
        let mut bufs = vec![BytesMut::with_capacity(4096)];
        let mut buf_events = events.open(cpu, pages)?;
        let tx = tx.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.notified() => {
                        trace!("[cpu {cpu} reader] Shutdown requested, stopping...");
                        return;
                    }
                    evts = buf_events.read_events(&mut bufs) => {
                        let evts = match evts {
                            Ok(evts) => evts,
                            Err(e) => {
                                eprintln!("PerfEventArray read error on cpu {cpu}: {e}");
                                return;
                            }
                        };

                        if evts.lost > 0 {
                            warn!("cpu {cpu}: lost {} records, perf buffer was full", evts.lost);
                        }

                        for buf in bufs.iter().take(evts.read) {
                            let Some(event) = decode_event(buf) else {
                                warn!(
                                    "cpu {cpu}: dropping short sample ({} of {EVENT_SIZE} bytes)",
                                    buf.len()
                                );
                                continue;
                            };
                            if tx.send(Delivery { cpu, event }).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        });
    }
    trace!("Done setting up readers");
    Ok(())
}

fn spawn_event_writer(
    rx: Receiver<Delivery>,
    style: FormattingStyle,
    count: Option<u64>,
) -> JoinHandle<()> {
    tokio::spawn(write_events(rx, tokio::io::stdout(), style, count))
}

/// Drains the channel into `out`, stopping once `count` records have been written.
async fn write_events<W: AsyncWrite + Unpin + Send>(
    mut rx: Receiver<Delivery>,
    mut out: W,
    style: FormattingStyle,
    count: Option<u64>,
) {
    let mut written = 0u64;

    loop {
        if count.is_some_and(|limit| written >= limit) {
            trace!("printed {written} records, stopping");
            break;
        }

        let Some(delivery) = rx.recv().await else {
            break;
        };

        let mut output: Vec<u8> = vec![];
        let pin_output = Pin::new(&mut output);
        let formatter = Formatter::new(pin_output, style);
        if let Err(e) = handle_event(&delivery, formatter).await {
            log::error!("failed to format record: {e}");
            continue;
        }

        if let Err(e) = out.write_all(&output).await {
            log::error!("failed to write record: {e}");
            break;
        }
        if let Err(e) = out.flush().await {
            log::error!("failed to flush output: {e}");
            break;
        }

        written += 1;
    }
}

/// Failed calls that never got a successful exit leave their record in the pending table.
fn report_pending(ebpf: &Ebpf) {
    let Some(map) = ebpf.map("STORAGE") else {
        warn!("STORAGE map not found");
        return;
    };
    let storage: HashMap<_, u64, XattrEvent> = match HashMap::try_from(map) {
        Ok(storage) => storage,
        Err(e) => {
            warn!("cannot inspect pending table: {e}");
            return;
        }
    };

    let pending = storage.keys().filter(|key| key.is_ok()).count();
    if pending > 0 {
        warn!("{pending} pending record(s) left behind by failed calls");
    } else {
        debug!("no pending records left");
    }
}

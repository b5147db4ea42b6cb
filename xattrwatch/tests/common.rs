// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

use std::{
    io::{BufRead as _, BufReader, PipeReader},
    path::PathBuf,
    process::{self, Child, Output},
    thread::JoinHandle,
    time::Duration,
};

use assert_cmd::cargo::cargo_bin;

/// Scratch directory for workloads. Kept short so paths fit in a captured field.
pub const SCRATCH_DIR: &str = "/tmp/xattrwatch";

pub fn scratch_dir() -> PathBuf {
    let dir = PathBuf::from(SCRATCH_DIR);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn run_xattrwatch(args: &[&str]) -> (PipeReader, Child) {
    let mut cmd = process::Command::new(cargo_bin("xattrwatch"));

    let (reader, writer) = std::io::pipe().unwrap();

    let cmd = cmd
        //.env("RUST_LOG", "trace")
        .env("RUST_LOG", "warn")
        .args(args)
        .stdout(writer.try_clone().unwrap())
        .stderr(writer);

    let child = cmd
        .spawn()
        .unwrap_or_else(|e| panic!("Failed to run xattrwatch process for testing: {e}"));

    (reader, child)
}

pub fn run_workload(name: &str) -> Output {
    process::Command::new(cargo_bin("test-helper"))
        .arg(name)
        .arg(scratch_dir())
        .output()
        .unwrap()
}

pub fn wait_for_output(child: Child) -> Output {
    unsafe { libc::kill(child.id() as i32, libc::SIGINT) };

    child.wait_with_output().unwrap()
}

pub fn ensure_root() {
    assert_eq!(
        unsafe { libc::geteuid() },
        0,
        "Need to run test as root (using, for instance, cargo sudo)"
    );
}

pub fn read_until(
    mut reader: BufReader<PipeReader>,
    needle: String,
) -> JoinHandle<(BufReader<PipeReader>, Vec<u8>)> {
    std::thread::spawn(move || {
        let mut data = vec![];
        let mut buf = String::new();
        let mut found_error = false;
        while let Ok(bytes_read) = reader.read_line(&mut buf) {
            if bytes_read == 0 {
                break;
            }
            data.extend_from_slice(buf.as_bytes());

            eprint!("{}", buf);

            if buf.contains("Caused by:")
                || buf.contains("Stack backtrace")
                || buf.contains(" panicked at ")
            {
                found_error = true;
            }

            if buf.contains(&needle) {
                // Minor wait as what we are actually waiting for may come right
                // after the message being printed.
                std::thread::sleep(Duration::from_millis(10));
                break;
            }
            buf.clear();
        }
        if found_error {
            panic!("Found fatal error in xattrwatch output");
        }
        (reader, data)
    })
}

pub enum TestState {
    Running {
        reader: BufReader<PipeReader>,
    },
    BackgroundThread {
        handle: JoinHandle<(BufReader<PipeReader>, Vec<u8>)>,
    },
}

pub struct XattrwatchTest {
    child: Child,
    data: Vec<u8>,
    state: TestState,
}

impl XattrwatchTest {
    /// Starts the tracer and returns once its probes are attached. When a needle is given,
    /// output is collected in the background until it shows up.
    pub fn new(args: &[&str], needle: Option<String>) -> Self {
        ensure_root();

        let (reader, child) = run_xattrwatch(args);

        let reader = BufReader::new(reader);
        let (reader, data) = read_until(reader, "Waiting for Ctrl-C...".to_string())
            .join()
            .expect("xattrwatch probably failed to run");

        let state = if let Some(needle) = needle {
            let handle = read_until(reader, needle);
            TestState::BackgroundThread { handle }
        } else {
            TestState::Running { reader }
        };

        XattrwatchTest { child, data, state }
    }

    /// Interrupts the tracer and collects everything it printed.
    pub fn wait(mut self) -> Output {
        if let TestState::BackgroundThread { handle } = self.state {
            let (reader, more_data) = handle.join().unwrap();
            self.data.extend_from_slice(&more_data);
            self.state = TestState::Running { reader };
        }

        let TestState::Running { reader } = self.state else {
            unreachable!();
        };

        let handle = read_until(reader, "Exiting...".to_string());

        let mut output = wait_for_output(self.child);

        let (_, more_data) = handle.join().unwrap();
        self.data.extend_from_slice(&more_data);

        output.stdout = self.data;

        output
    }

    /// Waits for the tracer to exit on its own, as it does with `--count`.
    pub fn finish(mut self) -> Output {
        let TestState::BackgroundThread { handle } = self.state else {
            panic!("finish() needs a needle to read up to");
        };
        let (reader, more_data) = handle.join().unwrap();
        self.data.extend_from_slice(&more_data);

        let (_, more_data) = read_until(reader, "Exiting...".to_string())
            .join()
            .unwrap();
        self.data.extend_from_slice(&more_data);

        let mut output = self.child.wait_with_output().unwrap();
        output.stdout = self.data;

        output
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

use std::{
    ffi::CString,
    fs::File,
    os::unix::ffi::OsStrExt as _,
    path::{Path, PathBuf},
};

use anyhow::bail;

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args();

    // Ignore the binary name
    let _ = args.next();

    let Some(name) = args.next() else {
        bail!("Need a workload name as the first argument, nothing provided.")
    };
    let Some(dir) = args.next().map(PathBuf::from) else {
        bail!("Need a scratch directory as the second argument.")
    };

    match name.as_str() {
        "set_one" => set_one(&dir),
        "set_missing" => set_missing(&dir),
        "two_threads" => two_threads(&dir),
        "long_name" => long_name(&dir),
        name => bail!("Unknown workload name: {name}"),
    }
}

fn c_path(path: &Path) -> anyhow::Result<CString> {
    Ok(CString::new(path.as_os_str().as_bytes())?)
}

fn touch(path: &Path) -> anyhow::Result<CString> {
    File::create(path)?;
    c_path(path)
}

/// Calls setxattr (or lsetxattr). The value is NUL-terminated in memory, the kernel is told its
/// length without the terminator.
fn set(follow: bool, path: &CString, name: &str, value: &str) -> std::io::Result<()> {
    let name = CString::new(name)?;
    let value = CString::new(value)?;
    let size = value.as_bytes().len();

    let result = unsafe {
        if follow {
            libc::setxattr(
                path.as_ptr(),
                name.as_ptr(),
                value.as_ptr() as *const libc::c_void,
                size,
                0, // flags
            )
        } else {
            libc::lsetxattr(
                path.as_ptr(),
                name.as_ptr(),
                value.as_ptr() as *const libc::c_void,
                size,
                0, // flags
            )
        }
    };

    if result != 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn set_one(dir: &Path) -> anyhow::Result<()> {
    let path = touch(&dir.join("set_one"))?;

    if let Err(e) = set(true, &path, "user.tag", "v1") {
        bail!("setxattr failed: {e}");
    }

    Ok(())
}

fn set_missing(dir: &Path) -> anyhow::Result<()> {
    let missing = c_path(&dir.join("does_not_exist"))?;

    // The failing call runs on a thread of its own, so nothing reuses its key afterwards and the
    // record it parked stays in the pending table.
    let failed = std::thread::spawn(move || set(true, &missing, "user.tag", "v1"));
    match failed.join() {
        Ok(Err(e)) if e.raw_os_error() == Some(libc::ENOENT) => (),
        Ok(Err(e)) => bail!("setxattr failed with an unexpected error: {e}"),
        Ok(Ok(())) => bail!("setxattr unexpectedly succeeded on a missing file"),
        Err(_) => bail!("workload thread panicked"),
    }

    // Marker, lets the test know the failed call has gone by.
    let marker = touch(&dir.join("set_missing_marker"))?;
    if let Err(e) = set(true, &marker, "user.marker", "done") {
        bail!("setxattr failed: {e}");
    }

    Ok(())
}

fn two_threads(dir: &Path) -> anyhow::Result<()> {
    let a = touch(&dir.join("thread_a"))?;
    let b = touch(&dir.join("thread_b"))?;

    let handles: Vec<_> = [(a, "user.a", "1"), (b, "user.b", "2")]
        .into_iter()
        .map(|(path, name, value)| std::thread::spawn(move || set(false, &path, name, value)))
        .collect();

    for handle in handles {
        match handle.join() {
            Ok(Ok(())) => (),
            Ok(Err(e)) => bail!("lsetxattr failed: {e}"),
            Err(_) => bail!("workload thread panicked"),
        }
    }

    Ok(())
}

fn long_name(dir: &Path) -> anyhow::Result<()> {
    let path = touch(&dir.join("long_name"))?;
    let name = format!("user.{}", "a".repeat(75));

    if let Err(e) = set(true, &path, &name, "v1") {
        bail!("setxattr failed: {e}");
    }

    Ok(())
}

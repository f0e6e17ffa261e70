//! Platform probes: clocks, thread ids, machine identity, and trace UUIDs.
//!
//! Every probe is a leaf function returning a fixed-width value; the platform-specific parts
//! live in the `platform` module below.

use vellum_types::{Endianness, pack_name};

/// Nanoseconds since an unspecified epoch, monotonic within one process run.
pub fn now_ns() -> u64 {
    platform::now_ns()
}

/// Identifier of the calling OS thread.
pub fn thread_id() -> u64 {
    platform::thread_id()
}

pub fn endianness() -> Endianness {
    Endianness::native()
}

/// Machine architecture name packed into 8 bytes.
pub fn arch_id() -> u64 {
    pack_name(&platform::machine_name())
}

/// Operating system name packed into 8 bytes.
pub fn os_id() -> u64 {
    let name = match std::env::consts::OS {
        "android" => "Android",
        "linux" => "Linux",
        "windows" => "Windows",
        "macos" => "macOS",
        other => other,
    };
    pack_name(name)
}

pub fn pointer_size() -> u8 {
    std::mem::size_of::<usize>() as u8
}

/// A fresh random (version 4) UUID.
pub fn generate_uuid() -> [u8; 16] {
    uuid::Uuid::new_v4().into_bytes()
}

#[cfg(unix)]
mod platform {
    use std::ffi::CStr;

    pub fn now_ns() -> u64 {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        if rc != 0 {
            return 0;
        }
        (ts.tv_sec as u64) * 1_000_000_000 + ts.tv_nsec as u64
    }

    pub fn thread_id() -> u64 {
        unsafe { libc::pthread_self() as u64 }
    }

    pub fn machine_name() -> String {
        let mut buf = std::mem::MaybeUninit::<libc::utsname>::zeroed();
        let rc = unsafe { libc::uname(buf.as_mut_ptr()) };
        if rc != 0 {
            return std::env::consts::ARCH.to_string();
        }
        let buf = unsafe { buf.assume_init() };
        let machine = unsafe { CStr::from_ptr(buf.machine.as_ptr()) };
        machine.to_string_lossy().into_owned()
    }
}

#[cfg(not(unix))]
mod platform {
    use std::sync::OnceLock;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Instant;

    fn anchor() -> &'static Instant {
        static ANCHOR: OnceLock<Instant> = OnceLock::new();
        ANCHOR.get_or_init(Instant::now)
    }

    pub fn now_ns() -> u64 {
        anchor().elapsed().as_nanos().min(u64::MAX as u128) as u64
    }

    pub fn thread_id() -> u64 {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        thread_local! {
            static ID: u64 = NEXT.fetch_add(1, Ordering::Relaxed);
        }
        ID.with(|id| *id)
    }

    pub fn machine_name() -> String {
        std::env::consts::ARCH.to_string()
    }
}

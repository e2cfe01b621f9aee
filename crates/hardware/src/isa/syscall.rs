//! Linux syscall proxy.
//!
//! ECALL is executed as a conversation between the ALU stage and a
//! [`SyscallProxy`]. Each invocation may ask for a memory peek (the proxy is
//! called again with the bytes appended to `extra`) or hand back pokes and
//! output; the exchange ends once the proxy reports `done`.

use tracing::{debug, warn};

use crate::common::Cycle;

/// `write(fd, buf, len)`.
pub const SYS_WRITE: u64 = 64;
/// `exit(status)`.
pub const SYS_EXIT: u64 = 93;
/// `exit_group(status)`.
pub const SYS_EXIT_GROUP: u64 = 94;
/// `uname(buf)`.
pub const SYS_UNAME: u64 = 160;
/// `brk(addr)`.
pub const SYS_BRK: u64 = 214;

/// Errno returned for unimplemented syscalls.
pub const ENOSYS: i64 = 38;

/// Largest peek requested in one round; keeps every frame well under the cap.
pub const PEEK_CHUNK: u64 = 256;

/// Length of each field of `struct utsname`.
const UTSNAME_FIELD: usize = 65;

/// A read of process memory the proxy needs before it can continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peek {
    /// Virtual address.
    pub addr: u64,
    /// Length in bytes.
    pub size: u64,
}

/// A write to process memory produced by the syscall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poke {
    /// Virtual address.
    pub addr: u64,
    /// Bytes to store.
    pub data: Vec<u8>,
}

/// Bytes the process wrote to a file descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// File descriptor.
    pub fd: u64,
    /// Text written (lossily decoded as UTF-8).
    pub data: String,
}

/// Result of one proxy invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyscallEffect {
    /// The syscall is finished.
    pub done: bool,
    /// Memory the proxy needs to see next.
    pub peek: Option<Peek>,
    /// Memory the syscall writes.
    pub poke: Vec<Poke>,
    /// Output to forward to the host.
    pub output: Option<Output>,
    /// The process exits.
    pub shutdown: bool,
    /// Value returned in a0.
    pub result: Option<u64>,
}

impl SyscallEffect {
    /// A finished syscall returning `value`.
    pub fn returning(value: u64) -> Self {
        Self {
            done: true,
            result: Some(value),
            ..Self::default()
        }
    }

    /// An unfinished syscall waiting on a peek.
    pub fn peeking(addr: u64, size: u64) -> Self {
        Self {
            peek: Some(Peek { addr, size }),
            ..Self::default()
        }
    }
}

/// Executes syscalls on behalf of the simulated process.
pub trait SyscallProxy: Send {
    /// Advances syscall `num` with arguments a0..a5.
    ///
    /// `extra` holds the data of every peek answered so far, in request order.
    fn do_syscall(&mut self, num: u64, args: [u64; 6], cycle: Cycle, extra: &[Vec<u8>]) -> SyscallEffect;
}

/// Minimal Linux ABI: enough for statically linked programs that print and exit.
#[derive(Debug, Clone)]
pub struct LinuxSyscalls {
    brk: u64,
    brk_floor: u64,
}

impl LinuxSyscalls {
    /// Creates a proxy whose program break starts at `brk`.
    pub fn new(brk: u64) -> Self {
        Self { brk, brk_floor: brk }
    }

    fn write(fd: u64, buf: u64, len: u64, extra: &[Vec<u8>]) -> SyscallEffect {
        let have: u64 = extra.iter().map(|chunk| chunk.len() as u64).sum();
        if have < len {
            return SyscallEffect::peeking(buf + have, (len - have).min(PEEK_CHUNK));
        }
        let bytes: Vec<u8> = extra.concat();
        SyscallEffect {
            output: Some(Output {
                fd,
                data: String::from_utf8_lossy(&bytes).into_owned(),
            }),
            ..SyscallEffect::returning(len)
        }
    }

    fn brk(&mut self, addr: u64) -> SyscallEffect {
        if addr >= self.brk_floor {
            self.brk = addr;
        }
        SyscallEffect::returning(self.brk)
    }

    fn uname(buf: u64) -> SyscallEffect {
        let fields = ["Linux", "nebula", "5.0.0", "#1", "riscv64", ""];
        let mut data = vec![0u8; UTSNAME_FIELD * fields.len()];
        for (i, field) in fields.iter().enumerate() {
            let at = i * UTSNAME_FIELD;
            data[at..at + field.len()].copy_from_slice(field.as_bytes());
        }
        SyscallEffect {
            poke: vec![Poke { addr: buf, data }],
            ..SyscallEffect::returning(0)
        }
    }
}

impl SyscallProxy for LinuxSyscalls {
    fn do_syscall(&mut self, num: u64, args: [u64; 6], cycle: Cycle, extra: &[Vec<u8>]) -> SyscallEffect {
        debug!(num, ?args, cycle, "syscall");
        match num {
            SYS_WRITE => Self::write(args[0], args[1], args[2], extra),
            SYS_EXIT | SYS_EXIT_GROUP => SyscallEffect {
                done: true,
                shutdown: true,
                ..SyscallEffect::default()
            },
            SYS_BRK => self.brk(args[0]),
            SYS_UNAME => Self::uname(args[0]),
            _ => {
                warn!(num, cycle, "unsupported syscall");
                SyscallEffect::returning((-ENOSYS) as u64)
            }
        }
    }
}

//! The trace loop: forks the target under `PTRACE_TRACEME`, loads the
//! malloc interceptor via `LD_PRELOAD`, and alternates syscall-entry /
//! syscall-exit stops until the child exits. Two-phase state machine —
//! `Outside` means the next stop is an entry, `Inside` means it's the
//! matching exit — exactly like the tracer this was adapted from.

use crate::config::AppConfig;
use crate::decoder::SyscallHandlers;
use crate::error::{OswatchError, OswatchResult};
use crate::malloc_table::{EventLineParser, MallocEvent};
use crate::registers::RegisterView;
use crate::stats::ProcessStats;
use crate::time::Timestamp;
use log::{debug, warn};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{close, execvp, fork, pipe, ForkResult, Pid};
use std::ffi::CString;
use std::os::unix::io::RawFd;

const INTERCEPTOR_SO: &str = "liboswatch_interceptor.so";
const NOTIFY_FD_VAR: &str = "OSWATCH_NOTIFY_FD";

#[derive(Clone, Copy, PartialEq, Eq)]
enum SyscallPhase {
    Outside,
    Inside,
}

/// Run `program` under trace with `argv` (argv[0] included) and return
/// its exit code alongside the accumulated statistics.
pub fn launch(program: &str, argv: &[String], config: &AppConfig) -> OswatchResult<(i32, ProcessStats)> {
    if program.is_empty() {
        return Err(OswatchError::NoProgram);
    }

    let (read_fd, write_fd) = pipe().map_err(OswatchError::Pipe)?;
    set_nonblocking(read_fd);

    match unsafe { fork() }.map_err(OswatchError::Fork)? {
        ForkResult::Child => {
            // Never returns on success; any failure below exits the child.
            run_child(program, argv, write_fd);
            unreachable!("run_child always exits the process");
        }
        ForkResult::Parent { child } => {
            let _ = close(write_fd);
            let mut stats = ProcessStats::new(program, config.malloc_table_buckets, config.verbose);
            stats.pid = child.as_raw();

            let exit_code = run_parent(child, read_fd, &mut stats, config)?;

            let _ = close(read_fd);
            stats.finish();
            Ok((exit_code, stats))
        }
    }
}

fn set_nonblocking(fd: RawFd) {
    if let Ok(flags) = fcntl(fd, FcntlArg::F_GETFL) {
        let mut flags = OFlag::from_bits_truncate(flags);
        flags.insert(OFlag::O_NONBLOCK);
        let _ = fcntl(fd, FcntlArg::F_SETFL(flags));
    }
}

fn run_child(program: &str, argv: &[String], write_fd: RawFd) -> ! {
    std::env::set_var(NOTIFY_FD_VAR, write_fd.to_string());
    std::env::set_var("LD_PRELOAD", INTERCEPTOR_SO);

    if ptrace::traceme().is_err() {
        std::process::exit(1);
    }

    let c_program = match CString::new(program) {
        Ok(s) => s,
        Err(_) => std::process::exit(1),
    };
    let c_argv: Vec<CString> = argv
        .iter()
        .map(|a| CString::new(a.as_str()).unwrap_or_default())
        .collect();

    let _ = execvp(&c_program, &c_argv);
    // execvp only returns on failure.
    std::process::exit(1);
}

fn run_parent(
    child: Pid,
    notify_fd: RawFd,
    stats: &mut ProcessStats,
    config: &AppConfig,
) -> OswatchResult<i32> {
    // Child raises SIGTRAP right after PTRACE_TRACEME, before exec.
    waitpid(child, None).ok();
    ptrace::setoptions(
        child,
        ptrace::Options::PTRACE_O_TRACESYSGOOD | ptrace::Options::PTRACE_O_EXITKILL,
    )
    .map_err(OswatchError::SetOptions)?;

    let mut parser = EventLineParser::new();
    let mut handlers = SyscallHandlers::new();
    let mut phase = SyscallPhase::Outside;
    let mut entry_time = Timestamp::now();
    let mut exit_code = 0;
    let mut pending_signal: Option<Signal> = None;

    loop {
        drain_malloc_events(notify_fd, &mut parser, stats);

        if ptrace::syscall(child, pending_signal.take()).is_err() {
            break;
        }

        let status = match waitpid(child, Some(WaitPidFlag::empty())) {
            Ok(s) => s,
            Err(e) => {
                warn!("waitpid failed: {}", e);
                break;
            }
        };

        match status {
            WaitStatus::Exited(_, code) => {
                debug!("target exited with code {}", code);
                exit_code = code;
                break;
            }
            WaitStatus::Signaled(_, sig, _) => {
                debug!("target terminated by signal {}", sig);
                exit_code = 128 + sig as i32;
                break;
            }
            WaitStatus::PtraceSyscall(_) | WaitStatus::Stopped(_, _) => {
                if let WaitStatus::Stopped(_, sig) = status {
                    if sig as i32 != libc::SIGTRAP {
                        // Defer delivery to the next PTRACE_SYSCALL resume; the
                        // tracee is stopped right now, not running, so issuing
                        // any ptrace request other than a resume here fails.
                        pending_signal = Some(sig);
                        continue;
                    }
                }

                let regs = match ptrace::getregs(child) {
                    Ok(r) => RegisterView::new(r),
                    Err(_) => break,
                };

                match phase {
                    SyscallPhase::Outside => {
                        entry_time = Timestamp::now();
                        handlers.handle_entry(&regs, stats);
                        phase = SyscallPhase::Inside;
                    }
                    SyscallPhase::Inside => {
                        let duration_ms = entry_time.delta_ms(&Timestamp::now());
                        handlers.handle_exit(&regs, stats, duration_ms, config);
                        phase = SyscallPhase::Outside;
                    }
                }
            }
            WaitStatus::PtraceEvent(_, _, _) => break,
            _ => {}
        }
    }

    drain_malloc_events(notify_fd, &mut parser, stats);
    Ok(exit_code)
}

fn drain_malloc_events(fd: RawFd, parser: &mut EventLineParser, stats: &mut ProcessStats) {
    let mut buf = [0u8; 4096];
    loop {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n <= 0 {
            break;
        }
        for event in parser.feed(&buf[..n as usize]) {
            match event {
                MallocEvent::Alloc { address, size } => stats.malloc_table.track_alloc(address, size),
                MallocEvent::Free { address } => {
                    stats.malloc_table.track_free(address);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_rejects_empty_program() {
        let config = AppConfig::default();
        let result = launch("", &[], &config);
        assert!(matches!(result, Err(OswatchError::NoProgram)));
    }

    #[test]
    fn drain_malloc_events_updates_table_from_pipe() {
        let (read_fd, write_fd) = pipe().expect("pipe");
        set_nonblocking(read_fd);

        unsafe {
            libc::write(
                write_fd,
                b"ALLOC 0x1000 64\n".as_ptr() as *const libc::c_void,
                16,
            );
        }

        let mut stats = ProcessStats::new("t", 1024, false);
        let mut parser = EventLineParser::new();
        drain_malloc_events(read_fd, &mut parser, &mut stats);

        assert_eq!(stats.malloc_table.live_count(), 1);
        let _ = close(read_fd);
        let _ = close(write_fd);
    }
}

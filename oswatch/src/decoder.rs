//! Maps syscall numbers to names and drives the entry/exit side
//! effects on `ProcessStats`. Pointer arguments are never dereferenced
//! here — filenames for `open`/`openat` are resolved out-of-band via
//! `/proc/<pid>/fd/<n>` in `fd_table`, not by reading the child's
//! memory.

use crate::config::AppConfig;
use crate::mapping::MappingKind;
use crate::registers::RegisterView;
use crate::stats::ProcessStats;
use std::collections::HashMap;

const SYS_OPEN: i64 = 2;
const SYS_CLOSE: i64 = 3;
const SYS_MMAP: i64 = 9;
const SYS_MUNMAP: i64 = 11;
const SYS_BRK: i64 = 12;
const SYS_OPENAT: i64 = 257;

lazy_static! {
    static ref SYSCALL_NAMES: HashMap<i64, &'static str> = build_syscall_names();
}

fn build_syscall_names() -> HashMap<i64, &'static str> {
    let mut m = HashMap::new();
    let entries: &[(i64, &str)] = &[
        (0, "read"),
        (1, "write"),
        (2, "open"),
        (3, "close"),
        (4, "stat"),
        (5, "fstat"),
        (6, "lstat"),
        (7, "poll"),
        (8, "lseek"),
        (9, "mmap"),
        (10, "mprotect"),
        (11, "munmap"),
        (12, "brk"),
        (13, "rt_sigaction"),
        (14, "rt_sigprocmask"),
        (15, "rt_sigreturn"),
        (16, "ioctl"),
        (17, "pread64"),
        (18, "pwrite64"),
        (19, "readv"),
        (20, "writev"),
        (21, "access"),
        (22, "pipe"),
        (24, "sched_yield"),
        (25, "mremap"),
        (26, "msync"),
        (27, "mincore"),
        (28, "madvise"),
        (29, "shmget"),
        (30, "shmat"),
        (31, "shmctl"),
        (32, "dup"),
        (33, "dup2"),
        (34, "pause"),
        (35, "nanosleep"),
        (37, "alarm"),
        (38, "setitimer"),
        (39, "getpid"),
        (40, "sendfile"),
        (41, "socket"),
        (42, "connect"),
        (43, "accept"),
        (44, "sendto"),
        (45, "recvfrom"),
        (46, "sendmsg"),
        (47, "recvmsg"),
        (48, "shutdown"),
        (49, "bind"),
        (50, "listen"),
        (51, "getsockname"),
        (52, "getpeername"),
        (53, "socketpair"),
        (54, "setsockopt"),
        (55, "getsockopt"),
        (56, "clone"),
        (57, "fork"),
        (58, "vfork"),
        (59, "execve"),
        (60, "exit"),
        (61, "wait4"),
        (62, "kill"),
        (63, "uname"),
        (72, "fcntl"),
        (73, "flock"),
        (74, "fsync"),
        (75, "fdatasync"),
        (76, "truncate"),
        (77, "ftruncate"),
        (78, "getdents"),
        (79, "getcwd"),
        (80, "chdir"),
        (81, "fchdir"),
        (82, "rename"),
        (83, "mkdir"),
        (84, "rmdir"),
        (85, "creat"),
        (86, "link"),
        (87, "unlink"),
        (88, "symlink"),
        (89, "readlink"),
        (90, "chmod"),
        (91, "fchmod"),
        (92, "chown"),
        (93, "fchown"),
        (96, "gettimeofday"),
        (97, "getrlimit"),
        (98, "getrusage"),
        (99, "sysinfo"),
        (102, "getuid"),
        (104, "getgid"),
        (105, "setuid"),
        (106, "setgid"),
        (107, "geteuid"),
        (108, "getegid"),
        (110, "getppid"),
        (111, "getpgrp"),
        (112, "setsid"),
        (186, "gettid"),
        (202, "futex"),
        (217, "getdents64"),
        (228, "clock_gettime"),
        (230, "clock_nanosleep"),
        (231, "exit_group"),
        (232, "epoll_wait"),
        (233, "epoll_ctl"),
        (234, "tgkill"),
        (257, "openat"),
        (258, "mkdirat"),
        (259, "mknodat"),
        (260, "fchownat"),
        (261, "futimesat"),
        (262, "newfstatat"),
        (263, "unlinkat"),
        (264, "renameat"),
        (265, "linkat"),
        (266, "symlinkat"),
        (267, "readlinkat"),
        (268, "fchmodat"),
        (269, "faccessat"),
        (281, "epoll_pwait"),
        (318, "getrandom"),
    ];
    for (num, name) in entries {
        m.insert(*num, *name);
    }
    m
}

pub fn syscall_name(num: i64) -> &'static str {
    SYSCALL_NAMES.get(&num).copied().unwrap_or("unknown")
}

/// Owns the cross-call `brk` bookkeeping the original tool kept in
/// function-local statics. One instance lives for the lifetime of a
/// single traced run.
#[derive(Default)]
pub struct SyscallHandlers {
    initial_brk: Option<u64>,
    last_brk: Option<u64>,
}

impl SyscallHandlers {
    pub fn new() -> SyscallHandlers {
        SyscallHandlers::default()
    }

    pub fn handle_entry(&mut self, regs: &RegisterView, stats: &mut ProcessStats) {
        let syscall_num = regs.syscall_number();
        stats.record_syscall_entry(syscall_num);

        if stats.verbose {
            println!(
                "[SYSCALL] {:<15} (num={}, args: 0x{:x}, 0x{:x}, 0x{:x})",
                syscall_name(syscall_num),
                syscall_num,
                regs.arg(0),
                regs.arg(1),
                regs.arg(2),
            );
        }
    }

    pub fn handle_exit(
        &mut self,
        regs: &RegisterView,
        stats: &mut ProcessStats,
        duration_ms: f64,
        config: &AppConfig,
    ) {
        stats.total_syscall_time_ms += duration_ms;

        let syscall_num = regs.syscall_number();
        let ret = regs.return_value();

        match syscall_num {
            SYS_MMAP => self.handle_mmap_exit(regs, stats, ret, config),
            SYS_MUNMAP => self.handle_munmap_exit(regs, stats, ret, config),
            SYS_BRK => self.handle_brk_exit(ret, stats),
            SYS_OPEN | SYS_OPENAT => self.handle_open_exit(regs, stats, ret),
            SYS_CLOSE => self.handle_close_exit(regs, stats, ret),
            _ => {}
        }
    }

    fn handle_mmap_exit(
        &mut self,
        regs: &RegisterView,
        stats: &mut ProcessStats,
        ret: i64,
        config: &AppConfig,
    ) {
        if ret > 0 {
            let size = regs.arg(1);
            if size >= config.mmap_library_floor_bytes {
                stats
                    .mappings
                    .insert(ret as u64, size, MappingKind::MmapLibrary);
                if stats.verbose {
                    println!(
                        "[MEMORY] mmap allocated {} bytes at 0x{:x} (library)",
                        size, ret
                    );
                }
            }
        }
    }

    fn handle_munmap_exit(
        &mut self,
        regs: &RegisterView,
        stats: &mut ProcessStats,
        ret: i64,
        config: &AppConfig,
    ) {
        if ret == 0 {
            let addr = regs.arg(0);
            let size = regs.arg(1);
            if size >= config.mmap_library_floor_bytes {
                stats.mappings.remove(addr);
                if stats.verbose {
                    println!(
                        "[MEMORY] munmap freed {} bytes at 0x{:x} (library)",
                        size, addr
                    );
                }
            }
        }
    }

    fn handle_brk_exit(&mut self, ret: i64, stats: &mut ProcessStats) {
        if ret == -1 {
            return;
        }
        let new_brk = ret as u64;

        match self.last_brk {
            None => {
                self.initial_brk = Some(new_brk);
                self.last_brk = Some(new_brk);
            }
            Some(last) if new_brk != last => {
                if new_brk > last {
                    stats.heap_allocated += new_brk - last;
                } else {
                    stats.heap_freed += last - new_brk;
                }
                self.last_brk = Some(new_brk);
            }
            _ => {}
        }
    }

    fn handle_open_exit(&mut self, regs: &RegisterView, stats: &mut ProcessStats, ret: i64) {
        if ret >= 0 {
            stats.files_opened += 1;
            let flags = regs.arg(1) as i32;
            stats.fd_table.insert(stats.pid, ret as i32, flags);
        }
    }

    fn handle_close_exit(&mut self, regs: &RegisterView, stats: &mut ProcessStats, ret: i64) {
        if ret == 0 {
            stats.files_closed += 1;
            stats.fd_table.remove(regs.arg(0) as i32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libc::user_regs_struct;

    fn regs_with(orig_rax: i64, rax: i64, args: [u64; 6]) -> RegisterView {
        let mut r: user_regs_struct = unsafe { std::mem::zeroed() };
        r.orig_rax = orig_rax as u64;
        r.rax = rax as u64;
        r.rdi = args[0];
        r.rsi = args[1];
        r.rdx = args[2];
        r.r10 = args[3];
        r.r8 = args[4];
        r.r9 = args[5];
        RegisterView::new(r)
    }

    #[test]
    fn unknown_syscall_name_is_labeled() {
        assert_eq!(syscall_name(99999), "unknown");
        assert_eq!(syscall_name(9), "mmap");
    }

    #[test]
    fn brk_tracks_growth_and_shrinkage() {
        let mut handlers = SyscallHandlers::new();
        let mut stats = ProcessStats::new("t", 1024, false);

        handlers.handle_brk_exit(0x10000, &mut stats);
        assert_eq!(stats.heap_allocated, 0);

        handlers.handle_brk_exit(0x11000, &mut stats);
        assert_eq!(stats.heap_allocated, 0x1000);

        handlers.handle_brk_exit(0x10800, &mut stats);
        assert_eq!(stats.heap_freed, 0x800);
    }

    #[test]
    fn mmap_below_floor_is_not_tracked() {
        let mut handlers = SyscallHandlers::new();
        let mut stats = ProcessStats::new("t", 1024, false);
        let config = AppConfig::default();

        let regs = regs_with(9, 0x2000, [0, 4096, 0, 0, 0, 0]);
        handlers.handle_exit(&regs, &mut stats, 0.0, &config);
        assert!(stats.mappings.is_empty());
    }

    #[test]
    fn mmap_above_floor_is_tracked_and_unmap_removes_it() {
        let mut handlers = SyscallHandlers::new();
        let mut stats = ProcessStats::new("t", 1024, false);
        let config = AppConfig::default();

        let mmap_regs = regs_with(9, 0x2000, [0, 131072, 0, 0, 0, 0]);
        handlers.handle_exit(&mmap_regs, &mut stats, 0.0, &config);
        assert_eq!(stats.mappings.residual_blocks().count(), 1);

        let munmap_regs = regs_with(11, 0, [0x2000, 131072, 0, 0, 0, 0]);
        handlers.handle_exit(&munmap_regs, &mut stats, 0.0, &config);
        assert!(stats.mappings.is_empty());
    }

    #[test]
    fn open_and_close_update_fd_table_and_counters() {
        let mut handlers = SyscallHandlers::new();
        let mut stats = ProcessStats::new("t", 1024, false);
        stats.pid = std::process::id() as i32;
        let config = AppConfig::default();

        let open_regs = regs_with(2, 3, [0, libc::O_RDONLY as u64, 0, 0, 0, 0]);
        handlers.handle_exit(&open_regs, &mut stats, 0.0, &config);
        assert_eq!(stats.files_opened, 1);
        assert_eq!(stats.fd_table.len(), 1);

        let close_regs = regs_with(3, 0, [3, 0, 0, 0, 0, 0]);
        handlers.handle_exit(&close_regs, &mut stats, 0.0, &config);
        assert_eq!(stats.files_closed, 1);
        assert!(stats.fd_table.is_empty());
    }
}

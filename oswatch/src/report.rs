//! The serializable report model. `report_render` turns this into
//! colored terminal output; with `--json` the binary serializes it
//! directly instead.

use crate::config::AppConfig;
use crate::decoder::syscall_name;
use crate::leak_analyzer::{self, LeakReport};
use crate::stats::ProcessStats;
use serde::Serialize;

#[derive(Serialize)]
pub struct SyscallStat {
    pub name: String,
    pub count: u64,
}

#[derive(Serialize)]
pub struct FileOpStat {
    pub fd: i32,
    pub filename: String,
    pub flags: String,
}

#[derive(Serialize)]
pub struct MallocLeakStat {
    pub address: String,
    pub size: u64,
}

#[derive(Serialize)]
pub struct Report {
    pub pid: i32,
    pub program_name: String,
    pub execution_time_ms: f64,

    pub total_syscalls: u64,
    pub total_syscall_time_ms: f64,
    pub top_syscalls: Vec<SyscallStat>,

    pub heap_allocated: u64,
    pub heap_freed: u64,
    pub heap_leaked: u64,

    pub mmap_total_allocated: u64,
    pub mmap_total_freed: u64,
    pub mmap_peak_usage: u64,
    pub mmap_current_usage: u64,
    pub mmap_residual_count: u64,
    pub mmap_residual_bytes: u64,

    pub files_opened: u64,
    pub files_closed: u64,
    pub unclosed_files: Vec<FileOpStat>,

    pub malloc_allocations: u64,
    pub malloc_frees: u64,
    pub malloc_bytes_allocated: u64,
    pub malloc_bytes_freed: u64,
    pub malloc_user_leaks: Vec<MallocLeakStat>,
    pub malloc_stdio_leak_count: u64,
    pub malloc_stdio_leaked_bytes: u64,

    pub verdict: String,
}

impl Report {
    pub fn build(stats: &ProcessStats, config: &AppConfig) -> Report {
        let leak: LeakReport = leak_analyzer::analyze(stats, config);

        let mut top_syscalls: Vec<SyscallStat> = stats
            .syscall_counts
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(num, &count)| SyscallStat {
                name: syscall_name(num as i64).to_string(),
                count,
            })
            .collect();
        top_syscalls.sort_by(|a, b| b.count.cmp(&a.count));

        let unclosed_files = stats
            .fd_table
            .residual()
            .map(|f| FileOpStat {
                fd: f.fd,
                filename: f.filename.clone(),
                flags: f.open_flags().describe(),
            })
            .collect();

        let malloc_user_leaks = leak
            .malloc
            .user_leaks
            .iter()
            .map(|l| MallocLeakStat {
                address: format!("0x{:x}", l.address),
                size: l.size,
            })
            .collect();

        Report {
            pid: stats.pid,
            program_name: stats.program_name.clone(),
            execution_time_ms: stats.execution_time_ms,

            total_syscalls: stats.total_syscalls,
            total_syscall_time_ms: stats.total_syscall_time_ms,
            top_syscalls,

            heap_allocated: leak.heap_allocated,
            heap_freed: leak.heap_freed,
            heap_leaked: leak.heap_leaked,

            mmap_total_allocated: stats.mappings.total_allocated,
            mmap_total_freed: stats.mappings.total_freed,
            mmap_peak_usage: stats.mappings.peak_usage,
            mmap_current_usage: stats.mappings.current_usage,
            mmap_residual_count: leak.mappings.residual_count,
            mmap_residual_bytes: leak.mappings.residual_bytes,

            files_opened: stats.files_opened,
            files_closed: stats.files_closed,
            unclosed_files,

            malloc_allocations: stats.malloc_table.allocations,
            malloc_frees: stats.malloc_table.frees,
            malloc_bytes_allocated: stats.malloc_table.bytes_allocated,
            malloc_bytes_freed: stats.malloc_table.bytes_freed,
            malloc_user_leaks,
            malloc_stdio_leak_count: leak.malloc.stdio_leak_count,
            malloc_stdio_leaked_bytes: leak.malloc.stdio_leaked_bytes,

            verdict: leak.verdict.label().to_string(),
        }
    }
}

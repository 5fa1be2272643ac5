//! `ProcessStats` — the single per-run accumulator object, owned
//! exclusively by the supervisor. Nothing inside the traced child
//! reaches into this; the interceptor only ever appends lines to the
//! pipe.

use crate::config::MAX_SYSCALL_NUM;
use crate::fd_table::FdTable;
use crate::malloc_table::MallocTable;
use crate::mapping::MappingTracker;
use crate::time::Timestamp;

pub struct ProcessStats {
    pub pid: i32,
    pub program_name: String,

    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub execution_time_ms: f64,

    pub total_syscalls: u64,
    pub syscall_counts: Vec<u64>,
    pub total_syscall_time_ms: f64,

    pub mappings: MappingTracker,
    pub heap_allocated: u64,
    pub heap_freed: u64,

    pub malloc_table: MallocTable,

    pub files_opened: u64,
    pub files_closed: u64,
    pub fd_table: FdTable,

    pub verbose: bool,
    pub program_started: bool,
}

impl ProcessStats {
    pub fn new(program_name: &str, malloc_table_buckets: usize, verbose: bool) -> ProcessStats {
        ProcessStats {
            pid: 0,
            program_name: program_name.to_string(),
            start_time: Timestamp::now(),
            end_time: None,
            execution_time_ms: 0.0,
            total_syscalls: 0,
            syscall_counts: vec![0; MAX_SYSCALL_NUM],
            total_syscall_time_ms: 0.0,
            mappings: MappingTracker::new(),
            heap_allocated: 0,
            heap_freed: 0,
            malloc_table: MallocTable::new(malloc_table_buckets),
            files_opened: 0,
            files_closed: 0,
            fd_table: FdTable::new(),
            verbose,
            program_started: false,
        }
    }

    pub fn record_syscall_entry(&mut self, syscall_number: i64) {
        if syscall_number < 0 || syscall_number as usize >= MAX_SYSCALL_NUM {
            return;
        }
        self.total_syscalls += 1;
        self.syscall_counts[syscall_number as usize] += 1;
    }

    pub fn finish(&mut self) {
        let end = Timestamp::now();
        self.execution_time_ms = self.start_time.delta_ms(&end);
        self.end_time = Some(end);
    }

    pub fn heap_residual(&self) -> u64 {
        self.heap_allocated.saturating_sub(self.heap_freed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syscall_entry_out_of_bounds_is_ignored() {
        let mut stats = ProcessStats::new("target", 1024, false);
        stats.record_syscall_entry(MAX_SYSCALL_NUM as i64);
        stats.record_syscall_entry(-1);
        assert_eq!(stats.total_syscalls, 0);
    }

    #[test]
    fn syscall_entry_in_bounds_increments_counters() {
        let mut stats = ProcessStats::new("target", 1024, false);
        stats.record_syscall_entry(9);
        stats.record_syscall_entry(9);
        assert_eq!(stats.total_syscalls, 2);
        assert_eq!(stats.syscall_counts[9], 2);
    }

    #[test]
    fn heap_residual_is_allocated_minus_freed() {
        let mut stats = ProcessStats::new("target", 1024, false);
        stats.heap_allocated = 100;
        stats.heap_freed = 40;
        assert_eq!(stats.heap_residual(), 60);
    }
}

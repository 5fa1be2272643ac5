//! Classifies everything still live when the traced program exits.
//! Two independent passes, matching the two trackers they read from:
//! the malloc hash table (user-space leaks) and the mmap/brk tracker
//! (kernel-level residual mappings). Library/stdio noise is reported
//! but never counted toward the verdict.

use crate::config::AppConfig;
use crate::stats::ProcessStats;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    LeakFree,
    HasLeaks,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::LeakFree => "LEAK-FREE",
            Verdict::HasLeaks => "HAS LEAKS",
        }
    }
}

#[derive(Clone, Debug)]
pub struct MallocLeak {
    pub address: u64,
    pub size: u64,
}

#[derive(Clone, Debug, Default)]
pub struct MallocLeakAnalysis {
    pub user_leaks: Vec<MallocLeak>,
    pub user_leaked_bytes: u64,
    pub stdio_leak_count: u64,
    pub stdio_leaked_bytes: u64,
}

#[derive(Clone, Debug, Default)]
pub struct MappingLeakAnalysis {
    pub residual_count: u64,
    pub residual_bytes: u64,
}

#[derive(Clone, Debug)]
pub struct LeakReport {
    pub heap_allocated: u64,
    pub heap_freed: u64,
    pub heap_leaked: u64,
    pub malloc: MallocLeakAnalysis,
    pub mappings: MappingLeakAnalysis,
    pub verdict: Verdict,
}

/// Runs both passes over a finished `ProcessStats` and folds them into
/// a single verdict. The verdict reflects the user-space pass alone:
/// a non-stdio-sized malloc residual means `HasLeaks`, everything else
/// — heap growth from `brk`, library/mmap residue, stdio-sized malloc
/// blocks — is surfaced in the report for visibility but is
/// informational only.
pub fn analyze(stats: &ProcessStats, config: &AppConfig) -> LeakReport {
    let heap_allocated = stats.heap_allocated;
    let heap_freed = stats.heap_freed;
    let heap_leaked = stats.heap_residual();

    let malloc = analyze_malloc_residuals(stats, config);
    let mappings = analyze_mapping_residuals(stats);

    let verdict = if malloc.user_leaks.is_empty() {
        Verdict::LeakFree
    } else {
        Verdict::HasLeaks
    };

    LeakReport {
        heap_allocated,
        heap_freed,
        heap_leaked,
        malloc,
        mappings,
        verdict,
    }
}

fn analyze_malloc_residuals(stats: &ProcessStats, config: &AppConfig) -> MallocLeakAnalysis {
    let mut analysis = MallocLeakAnalysis::default();

    for (address, size) in stats.malloc_table.residual_blocks() {
        if config.is_stdio_buffer_size(size) {
            analysis.stdio_leak_count += 1;
            analysis.stdio_leaked_bytes += size;
        } else {
            analysis.user_leaked_bytes += size;
            analysis.user_leaks.push(MallocLeak { address, size });
        }
    }

    analysis
}

fn analyze_mapping_residuals(stats: &ProcessStats) -> MappingLeakAnalysis {
    let mut analysis = MappingLeakAnalysis::default();
    for block in stats.mappings.residual_blocks() {
        analysis.residual_count += 1;
        analysis.residual_bytes += block.size;
    }
    analysis
}

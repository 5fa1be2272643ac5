//! Terminal rendering of a `Report`. Mirrors the original tool's boxed
//! section headers and color scheme (cyan frames, red leak banners,
//! yellow warnings, green all-clear) but drives them through the
//! `colored` crate instead of raw escape sequences.

use crate::report::Report;
use colored::Colorize;
use std::fmt::Write as _;

const RULE: &str = "═══════════════════════════════════════════════════════";

pub fn render(report: &Report) -> String {
    let mut out = String::new();

    render_process_stats(report, &mut out);
    render_memory_leaks(report, &mut out);

    let _ = writeln!(out, "{}", RULE.cyan());
    let _ = writeln!(out, "{}", "Analysis complete!".green());
    let _ = writeln!(out, "{}", RULE.cyan());

    out
}

fn render_process_stats(report: &Report, out: &mut String) {
    let _ = writeln!(out, "{}", "PROCESS STATISTICS".cyan().bold());
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", "Process Information:".bold());
    let _ = writeln!(out, "  PID:            {}", report.pid);
    let _ = writeln!(out, "  Name:           {}", report.program_name);
    let _ = writeln!(
        out,
        "  Execution Time: {:.2} ms\n",
        report.execution_time_ms
    );

    let _ = writeln!(out, "{}", "System Call Statistics:".bold());
    let _ = writeln!(out, "  Total Syscalls: {}", report.total_syscalls);
    let _ = writeln!(
        out,
        "  Total Time:     {:.2} ms",
        report.total_syscall_time_ms
    );
    if report.total_syscalls > 0 {
        let avg = report.total_syscall_time_ms / report.total_syscalls as f64;
        let _ = writeln!(out, "  Avg Duration:   {:.4} ms", avg);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", "Memory Statistics:".bold());
    let _ = writeln!(
        out,
        "  Heap Allocated:  {} bytes ({:.2} KB)",
        report.heap_allocated,
        report.heap_allocated as f64 / 1024.0
    );
    let _ = writeln!(
        out,
        "  Heap Freed:      {} bytes ({:.2} KB)",
        report.heap_freed,
        report.heap_freed as f64 / 1024.0
    );
    let _ = writeln!(
        out,
        "  Mmap Peak Usage: {} bytes ({:.2} KB)",
        report.mmap_peak_usage,
        report.mmap_peak_usage as f64 / 1024.0
    );
    let _ = writeln!(
        out,
        "  Mmap Current:    {} bytes ({:.2} KB)\n",
        report.mmap_current_usage,
        report.mmap_current_usage as f64 / 1024.0
    );

    let _ = writeln!(out, "{}", "File Operations:".bold());
    let _ = writeln!(out, "  Files Opened:  {}", report.files_opened);
    let _ = writeln!(out, "  Files Closed:  {}", report.files_closed);
    if report.files_opened != report.files_closed {
        let unclosed = report.files_opened - report.files_closed;
        let _ = writeln!(
            out,
            "  {}",
            format!("Warning: {} file(s) not properly closed!", unclosed).yellow()
        );
        for f in &report.unclosed_files {
            let _ = writeln!(out, "    fd {} -> {} ({})", f.fd, f.filename, f.flags);
        }
    } else {
        let _ = writeln!(out, "  {}", "All files properly closed".green());
    }
    let _ = writeln!(out);
}

fn render_memory_leaks(report: &Report, out: &mut String) {
    let _ = writeln!(out, "{}", "MEMORY LEAK ANALYSIS".red().bold());
    let _ = writeln!(out);

    if report.heap_leaked > 0 {
        let _ = writeln!(out, "{}", "HEAP MEMORY LEAK DETECTED:".bold());
        let _ = writeln!(
            out,
            "  Heap allocated: {} bytes ({:.2} KB)",
            report.heap_allocated,
            report.heap_allocated as f64 / 1024.0
        );
        let _ = writeln!(
            out,
            "  Heap freed:     {} bytes ({:.2} KB)",
            report.heap_freed,
            report.heap_freed as f64 / 1024.0
        );
        let _ = writeln!(
            out,
            "  {}",
            format!(
                "Net leaked: {} bytes ({:.2} KB)",
                report.heap_leaked,
                report.heap_leaked as f64 / 1024.0
            )
            .red()
        );
        let _ = writeln!(out);
    }

    if report.malloc_user_leaks.is_empty() {
        let _ = writeln!(
            out,
            "{}",
            "No user malloc/free leaks detected.".green()
        );
    } else {
        let _ = writeln!(out, "{}", "USER MEMORY LEAKS DETECTED:".red().bold());
        for (i, leak) in report.malloc_user_leaks.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {} address={} size={} bytes",
                format!("Leak #{}:", i + 1).yellow(),
                leak.address,
                leak.size
            );
        }
    }
    let _ = writeln!(out);

    if report.malloc_stdio_leak_count > 0 {
        let _ = writeln!(out, "{}", "LIBRARY/STDIO ALLOCATIONS (not bugs):".cyan());
        let _ = writeln!(
            out,
            "  {} allocations, {} bytes\n",
            report.malloc_stdio_leak_count, report.malloc_stdio_leaked_bytes
        );
    }

    if report.mmap_residual_count > 0 {
        let _ = writeln!(out, "{}", "LIBRARY/SYSTEM MMAP ALLOCATIONS (not bugs):".cyan());
        let _ = writeln!(
            out,
            "  {} regions, {:.2} KB still mapped\n",
            report.mmap_residual_count,
            report.mmap_residual_bytes as f64 / 1024.0
        );
    }

    let _ = writeln!(out, "{}", RULE.cyan());
    let _ = writeln!(out, "{}", "VERDICT:".bold());
    let verdict_line = if report.verdict == "HAS LEAKS" {
        report.verdict.red().bold()
    } else {
        report.verdict.green().bold()
    };
    let _ = writeln!(out, "  {}", verdict_line);
}

//! Startup-resolved tunables. The classification thresholds in the
//! original tool were bare constants; here they're an explicit,
//! immutable config value threaded through the decoder and the leak
//! analyzer instead of being baked in.

/// Minimum `mmap`/`munmap` size tracked at the kernel layer. Anything
/// smaller is allocator noise and is left to the user-space tracker.
pub const DEFAULT_MMAP_LIBRARY_FLOOR_BYTES: u64 = 64 * 1024;

/// Sizes the leak analyzer treats as internal stdio buffers rather
/// than user leaks.
pub const DEFAULT_STDIO_BUFFER_SIZES: [u64; 3] = [1024, 4096, 8192];

/// Bucket count for the malloc hash table. Must be a power of two.
pub const DEFAULT_MALLOC_TABLE_BUCKETS: usize = 1024;

/// Compile-time bound on tracked syscall numbers.
pub const MAX_SYSCALL_NUM: usize = 400;

static_assertions::const_assert!(DEFAULT_MALLOC_TABLE_BUCKETS.is_power_of_two());
static_assertions::const_assert!(MAX_SYSCALL_NUM > 0);

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub mmap_library_floor_bytes: u64,
    pub stdio_buffer_sizes: Vec<u64>,
    pub malloc_table_buckets: usize,
    pub verbose: bool,
    pub quiet: bool,
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            mmap_library_floor_bytes: DEFAULT_MMAP_LIBRARY_FLOOR_BYTES,
            stdio_buffer_sizes: DEFAULT_STDIO_BUFFER_SIZES.to_vec(),
            malloc_table_buckets: DEFAULT_MALLOC_TABLE_BUCKETS,
            verbose: false,
            quiet: false,
            json: false,
        }
    }
}

impl AppConfig {
    pub fn is_stdio_buffer_size(&self, size: u64) -> bool {
        self.stdio_buffer_sizes.contains(&size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_original_heuristics() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.mmap_library_floor_bytes, 65536);
        assert!(cfg.is_stdio_buffer_size(1024));
        assert!(cfg.is_stdio_buffer_size(4096));
        assert!(cfg.is_stdio_buffer_size(8192));
        assert!(!cfg.is_stdio_buffer_size(1000));
        assert!(cfg.malloc_table_buckets.is_power_of_two());
    }
}

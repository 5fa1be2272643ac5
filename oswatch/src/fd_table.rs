//! Live file-descriptor table. Filenames are resolved best-effort via
//! `/proc/<pid>/fd/<n>` after the `open`/`openat` exit stop; failure to
//! resolve (race, permissions) just keeps the `<unknown>` placeholder,
//! never aborts the trace.

use crate::time::Timestamp;
use bitflags::bitflags;
use std::collections::HashMap;
use std::fs;

pub const UNKNOWN_FILENAME: &str = "<unknown>";

bitflags! {
    /// The subset of `open(2)` flags worth surfacing in a report; mirrors
    /// the raw `flags` argument captured off the syscall registers.
    pub struct OpenFlags: i32 {
        const RDONLY = libc::O_RDONLY;
        const WRONLY = libc::O_WRONLY;
        const RDWR = libc::O_RDWR;
        const CREAT = libc::O_CREAT;
        const TRUNC = libc::O_TRUNC;
        const APPEND = libc::O_APPEND;
        const NONBLOCK = libc::O_NONBLOCK;
    }
}

impl OpenFlags {
    /// `{:?}` reads `"(empty)"` for a bare `O_RDONLY` open, since bitflags
    /// has nothing to name for a zero value; every other combination prints
    /// its set bit names.
    pub fn describe(self) -> String {
        format!("{:?}", self)
    }
}

#[derive(Clone, Debug)]
pub struct FileDescriptor {
    pub fd: i32,
    pub filename: String,
    pub flags: i32,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub opened_at: Timestamp,
}

impl FileDescriptor {
    pub fn open_flags(&self) -> OpenFlags {
        OpenFlags::from_bits_truncate(self.flags)
    }
}

#[derive(Default)]
pub struct FdTable {
    open_files: HashMap<i32, FileDescriptor>,
}

impl FdTable {
    pub fn new() -> FdTable {
        FdTable::default()
    }

    pub fn insert(&mut self, pid: i32, fd: i32, flags: i32) {
        let filename = resolve_filename(pid, fd).unwrap_or_else(|| UNKNOWN_FILENAME.to_string());

        self.open_files.insert(
            fd,
            FileDescriptor {
                fd,
                filename,
                flags,
                bytes_read: 0,
                bytes_written: 0,
                opened_at: Timestamp::now(),
            },
        );
    }

    pub fn remove(&mut self, fd: i32) -> Option<FileDescriptor> {
        self.open_files.remove(&fd)
    }

    pub fn len(&self) -> usize {
        self.open_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open_files.is_empty()
    }

    pub fn residual(&self) -> impl Iterator<Item = &FileDescriptor> {
        self.open_files.values()
    }
}

fn resolve_filename(pid: i32, fd: i32) -> Option<String> {
    let link_path = format!("/proc/{}/fd/{}", pid, fd);
    fs::read_link(link_path)
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove_round_trips() {
        let mut table = FdTable::new();
        table.insert(std::process::id() as i32, 0, 0);
        assert_eq!(table.len(), 1);

        let removed = table.remove(0).expect("fd 0 should be tracked");
        assert_eq!(removed.fd, 0);
        assert!(table.is_empty());
    }

    #[test]
    fn remove_of_missing_fd_is_none() {
        let mut table = FdTable::new();
        assert!(table.remove(42).is_none());
    }

    #[test]
    fn unresolvable_filename_falls_back_to_unknown() {
        assert_eq!(resolve_filename(i32::MAX, 999), None);
    }

    #[test]
    fn resolve_filename_follows_a_real_fd_to_its_path() {
        use std::io::Write;
        use std::os::unix::io::AsRawFd;

        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "oswatch fd_table test").expect("write temp file");

        let resolved = resolve_filename(std::process::id() as i32, file.as_raw_fd())
            .expect("should resolve an open fd's path");
        assert_eq!(resolved, file.path().to_string_lossy());
    }

    #[test]
    fn open_flags_describe_named_combinations() {
        let write_create = OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC;
        let desc = write_create.describe();
        assert!(desc.contains("WRONLY"));
        assert!(desc.contains("CREAT"));
    }
}

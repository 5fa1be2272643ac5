use thiserror::Error;

/// Setup-phase failures are the only kind that abort `launch` outright.
/// Everything past a successful fork/exec is absorbed by the trace loop
/// and only ever surfaces as degraded statistics or a log line.
///
/// `PTRACE_TRACEME` and `execvp` failures happen inside the forked child,
/// which can't return a `Result` to the parent across the fork boundary —
/// like the original tool, the child reports those with `perror`-style
/// diagnostics and exits directly instead of producing a typed error here.
#[derive(Error, Debug)]
pub enum OswatchError {
    #[error("failed to create notification pipe: {0}")]
    Pipe(#[source] nix::Error),

    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),

    #[error("ptrace(SETOPTIONS) failed: {0}")]
    SetOptions(#[source] nix::Error),

    #[error("no program specified")]
    NoProgram,
}

pub type OswatchResult<T> = Result<T, OswatchError>;

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{ResolutionError, Result};

/// Default upper bound on a single git invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Variables that would point git at a repository other than `current_dir`.
const REPO_OVERRIDES: &[&str] = &[
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_COMMON_DIR",
    "GIT_OBJECT_DIRECTORY",
    "GIT_ALTERNATE_OBJECT_DIRECTORIES",
];

/// The two read-only questions asked of the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    /// Nearest tag reachable from HEAD, without the `-N-gHASH` suffix.
    Tag,
    /// Abbreviated hash of the most recent commit.
    Commit,
}

impl Query {
    pub fn args(self) -> &'static [&'static str] {
        match self {
            Query::Tag => &["describe", "--tags", "--abbrev=0"],
            Query::Commit => &["log", "--pretty=format:%h", "-n", "1"],
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Tag => write!(f, "tag lookup"),
            Query::Commit => write!(f, "commit lookup"),
        }
    }
}

/// Captured result of a git invocation that ran to completion.
#[derive(Debug)]
pub struct QueryOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Runs git with an explicit argument vector inside a given repository.
///
/// No shell is involved. The child gets `LC_ALL=C` so its diagnostics are
/// stable enough to classify, and loses any inherited `GIT_DIR`-style
/// overrides so `repo` is the only repository it can see. The calling
/// process's environment is untouched.
#[derive(Debug, Clone)]
pub struct GitCommand {
    program: OsString,
    repo: PathBuf,
    timeout: Option<Duration>,
}

impl GitCommand {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            program: OsString::from("git"),
            repo: repo.into(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    pub fn with_program(mut self, program: impl AsRef<OsStr>) -> Self {
        self.program = program.as_ref().to_os_string();
        self
    }

    /// `None` waits for git indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    pub fn run(&self, query: Query) -> Result<QueryOutput> {
        self.run_args(query, query.args())
    }

    fn run_args(&self, query: Query, args: &[&str]) -> Result<QueryOutput> {
        log::debug!(
            "{}: running {} {} in {}",
            query,
            self.program.to_string_lossy(),
            args.join(" "),
            self.repo.display()
        );

        let mut command = Command::new(&self.program);
        command.args(args).current_dir(&self.repo).env("LC_ALL", "C");
        for var in REPO_OVERRIDES {
            command.env_remove(var);
        }

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ResolutionError::ToolUnavailable {
                query,
                program: self.program.to_string_lossy().into_owned(),
                source,
            })?;

        // Drain both pipes off-thread so the child can never stall on a full pipe
        // while we are polling for its exit.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait(&mut child, query)?;

        let stdout = collect(stdout).map_err(|source| ResolutionError::Io { query, source })?;
        let stderr = collect(stderr).map_err(|source| ResolutionError::Io { query, source })?;

        let stdout =
            String::from_utf8(stdout).map_err(|_| ResolutionError::InvalidOutput { query })?;
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        Ok(QueryOutput {
            status,
            stdout,
            stderr,
        })
    }

    fn wait(&self, child: &mut Child, query: Query) -> Result<ExitStatus> {
        let Some(limit) = self.timeout else {
            return child
                .wait()
                .map_err(|source| ResolutionError::Io { query, source });
        };

        let deadline = Instant::now() + limit;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if Instant::now() >= deadline => {
                    log::warn!("{}: no answer after {:?}, killing git", query, limit);
                    // Already-exited races are fine here: either way the child is gone.
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ResolutionError::Timeout {
                        query,
                        after: limit,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => return Err(ResolutionError::Io { query, source }),
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn collect(handle: JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("pipe reader thread panicked")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_args_are_plain_argv() {
        assert_eq!(Query::Tag.args(), ["describe", "--tags", "--abbrev=0"]);
        assert_eq!(Query::Commit.args(), ["log", "--pretty=format:%h", "-n", "1"]);
        for arg in Query::Tag.args().iter().chain(Query::Commit.args()) {
            assert!(!arg.contains('\''), "argument {arg} carries shell quoting");
        }
    }

    #[test]
    fn query_display_names_the_lookup() {
        assert_eq!(Query::Tag.to_string(), "tag lookup");
        assert_eq!(Query::Commit.to_string(), "commit lookup");
    }

    #[test]
    fn missing_program_is_tool_unavailable() {
        let cmd = GitCommand::new(std::env::temp_dir())
            .with_program("gitrev-test-no-such-binary-on-path");
        match cmd.run(Query::Tag) {
            Err(ResolutionError::ToolUnavailable { program, query, .. }) => {
                assert_eq!(program, "gitrev-test-no-such-binary-on-path");
                assert_eq!(query, Query::Tag);
            }
            other => panic!("expected ToolUnavailable, got: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn slow_child_is_killed_at_deadline() {
        let cmd = GitCommand::new(std::env::temp_dir())
            .with_program("sleep")
            .with_timeout(Some(Duration::from_millis(100)));

        let started = Instant::now();
        let result = cmd.run_args(Query::Commit, &["5"]);
        assert!(started.elapsed() < Duration::from_secs(4));
        match result {
            Err(ResolutionError::Timeout { query, after }) => {
                assert_eq!(query, Query::Commit);
                assert_eq!(after, Duration::from_millis(100));
            }
            other => panic!("expected Timeout, got: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn repository_overrides_are_not_inherited() {
        let cmd = GitCommand::new(std::env::temp_dir())
            .with_program("env")
            .with_timeout(None);
        let out = cmd.run_args(Query::Tag, &[]).unwrap();
        for line in out.stdout.lines() {
            let name = line.split('=').next().unwrap_or_default();
            assert!(!REPO_OVERRIDES.contains(&name), "child saw {}", line);
        }
        assert!(out.stdout.lines().any(|l| l == "LC_ALL=C"));
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_status() {
        let cmd = GitCommand::new(std::env::temp_dir())
            .with_program("echo")
            .with_timeout(None);
        let out = cmd.run_args(Query::Tag, &["v9.9.9"]).unwrap();
        assert!(out.status.success());
        assert_eq!(out.stdout, "v9.9.9\n");
        assert!(out.stderr.is_empty());
    }

    #[test]
    fn defaults_to_git_with_bounded_timeout() {
        let cmd = GitCommand::new("/some/repo");
        assert_eq!(cmd.program, "git");
        assert_eq!(cmd.repo(), Path::new("/some/repo"));
        assert_eq!(cmd.timeout, Some(DEFAULT_TIMEOUT));
    }
}

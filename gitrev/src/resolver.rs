use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ResolutionError, Result};
use crate::flags::normalise;
use crate::query::{GitCommand, Query, QueryOutput};

/// Tag and abbreviated commit of a checkout, as resolved for one build.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SourceVersion {
    pub tag: String,
    pub commit: String,
}

/// Resolves [`SourceVersion`] for the repository at an explicit path.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    git: GitCommand,
}

impl VersionResolver {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            git: GitCommand::new(repo),
        }
    }

    /// Use a git executable other than the one found on `PATH`.
    pub fn with_git(mut self, program: impl AsRef<OsStr>) -> Self {
        self.git = self.git.with_program(program);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.git = self.git.with_timeout(timeout);
        self
    }

    pub fn repo(&self) -> &Path {
        self.git.repo()
    }

    /// Resolve the tag, then the commit. The commit lookup is not attempted
    /// if the tag lookup fails.
    pub fn resolve(&self) -> Result<SourceVersion> {
        let tag = self.resolve_tag()?;
        let commit = self.resolve_commit()?;
        Ok(SourceVersion { tag, commit })
    }

    /// Name of the nearest tag reachable from HEAD.
    pub fn resolve_tag(&self) -> Result<String> {
        self.resolve_value(Query::Tag)
    }

    /// Abbreviated hash of the most recent commit.
    pub fn resolve_commit(&self) -> Result<String> {
        self.resolve_value(Query::Commit)
    }

    fn resolve_value(&self, query: Query) -> Result<String> {
        if !self.repo().is_dir() {
            return Err(ResolutionError::NotARepository {
                query,
                path: self.repo().to_path_buf(),
            });
        }

        let output = self.git.run(query)?;
        if !output.status.success() {
            return Err(classify_failure(query, self.repo(), output));
        }

        let value = normalise(&output.stdout);
        if value.is_empty() {
            return Err(missing(query));
        }

        log::debug!("{}: {}", query, value);
        Ok(value.to_string())
    }
}

fn missing(query: Query) -> ResolutionError {
    match query {
        Query::Tag => ResolutionError::NoTagFound { query },
        Query::Commit => ResolutionError::NoCommitFound { query },
    }
}

/// Map a failed git invocation onto the error taxonomy using its (C locale)
/// diagnostics. Anything unrecognised keeps git's own message.
fn classify_failure(query: Query, repo: &Path, output: QueryOutput) -> ResolutionError {
    let stderr = output.stderr.trim();
    let lower = stderr.to_ascii_lowercase();

    if lower.contains("not a git repository") {
        return ResolutionError::NotARepository {
            query,
            path: repo.to_path_buf(),
        };
    }

    let recognised = match query {
        Query::Tag => {
            lower.contains("no names found") || lower.contains("no tags can describe")
        }
        Query::Commit => {
            lower.contains("does not have any commits")
                || lower.contains("bad default revision 'head'")
        }
    };
    if recognised {
        return missing(query);
    }

    ResolutionError::QueryFailed {
        query,
        status: output.status,
        stderr: stderr.to_string(),
    }
}

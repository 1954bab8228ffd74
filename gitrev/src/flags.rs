use std::fmt;
use std::io::{self, Write};

use crate::resolver::SourceVersion;

pub const DEFAULT_TAG_DEFINE: &str = "PIO_SRC_TAG";
pub const DEFAULT_REV_DEFINE: &str = "PIO_SRC_REV";

/// Strip surrounding whitespace and one matching pair of enclosing quotes
/// from a raw query result.
///
/// Applied identically to tag and commit values, so `'abc1234'\n` and
/// `"v1.0"` come out as `abc1234` and `v1.0`. Unpaired quotes are part of
/// the value: a tag named `v1'` stays `v1'`.
pub fn normalise(raw: &str) -> &str {
    let trimmed = raw.trim();
    ['\'', '"']
        .into_iter()
        .find_map(|q| trimmed.strip_prefix(q).and_then(|s| s.strip_suffix(q)))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Names of the two defines written for a [`SourceVersion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagNames {
    pub tag: String,
    pub rev: String,
}

impl Default for FlagNames {
    fn default() -> Self {
        Self {
            tag: DEFAULT_TAG_DEFINE.to_string(),
            rev: DEFAULT_REV_DEFINE.to_string(),
        }
    }
}

/// Renders a resolved version as `-D NAME=value` lines, tag first.
#[derive(Debug, Clone)]
pub struct BuildFlags<'a> {
    version: &'a SourceVersion,
    names: &'a FlagNames,
}

impl<'a> BuildFlags<'a> {
    pub fn new(version: &'a SourceVersion, names: &'a FlagNames) -> Self {
        Self { version, names }
    }

    /// Write both lines with a single `write_all`, so a consumer never sees
    /// the tag define without the revision define.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let rendered = self.to_string();
        out.write_all(rendered.as_bytes())?;
        out.flush()
    }
}

impl fmt::Display for BuildFlags<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-D {}={}", self.names.tag, self.version.tag)?;
        writeln!(f, "-D {}={}", self.names.rev, self.version.commit)
    }
}

/// Write the default `PIO_SRC_TAG` / `PIO_SRC_REV` defines for `tag` and `commit`.
pub fn emit<W: Write>(out: &mut W, tag: &str, commit: &str) -> io::Result<()> {
    let version = SourceVersion {
        tag: normalise(tag).to_string(),
        commit: normalise(commit).to_string(),
    };
    BuildFlags::new(&version, &FlagNames::default()).write_to(out)
}

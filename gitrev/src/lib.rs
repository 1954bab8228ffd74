//! Resolve the nearest git tag and the latest abbreviated commit of a checkout
//! and render them as `-D NAME=value` build defines.

pub mod error;
pub mod flags;
pub mod query;
pub mod resolver;
pub mod version;

pub use error::{ResolutionError, Result};
pub use flags::{BuildFlags, FlagNames, emit, normalise};
pub use query::{GitCommand, Query};
pub use resolver::{SourceVersion, VersionResolver};

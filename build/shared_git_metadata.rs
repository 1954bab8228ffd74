use std::path::PathBuf;

use gitrev::VersionResolver;

pub fn emit_git_metadata() {
    // Re-run when git state changes (commit, tag, branch) so cached
    // CI builds pick up the correct version after tagging.
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../build/shared_git_metadata.rs");
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/refs");
    println!("cargo:rerun-if-changed=../.git/packed-refs");

    let manifest_dir = std::env::var_os("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let resolver = VersionResolver::new(manifest_dir);

    // Building from a source tarball has no history: leave the fields blank.
    let commit = resolver.resolve_commit().unwrap_or_default();
    println!("cargo:rustc-env=GIT_COMMIT={commit}");

    let version = resolver.resolve_tag().unwrap_or_default();
    println!("cargo:rustc-env=RELEASE_VERSION={version}");
}

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use gitrev::flags::{DEFAULT_REV_DEFINE, DEFAULT_TAG_DEFINE};
use gitrev::{BuildFlags, FlagNames, VersionResolver};

/// Print `-D` build defines for the latest git tag and commit of a checkout.
#[derive(Parser)]
#[command(name = "gitrev-flags")]
struct Args {
    /// Repository to query
    #[arg(short = 'C', long = "repo", default_value = ".")]
    repo: PathBuf,

    /// git executable to run
    #[arg(long = "git", default_value = "git")]
    git: String,

    /// Time limit per git query in seconds (0 = wait indefinitely)
    #[arg(long = "timeout", default_value_t = 10)]
    timeout: u64,

    /// Define name for the tag line
    #[arg(long = "tag-define", default_value = DEFAULT_TAG_DEFINE)]
    tag_define: String,

    /// Define name for the commit line
    #[arg(long = "rev-define", default_value = DEFAULT_REV_DEFINE)]
    rev_define: String,

    /// Output as JSON instead of defines
    #[arg(long)]
    json: bool,

    /// Display version and quit
    #[arg(long = "version")]
    version: bool,
}

fn main() {
    // Reset SIGPIPE to default so a consumer closing the pipe early exits cleanly
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let stdout = io::stdout();

    if let Err(e) = run(&args, &mut stdout.lock()) {
        // The build log must show why the defines are missing, even with RUST_LOG=off.
        if log::log_enabled!(log::Level::Error) {
            log::error!("{}", e);
        } else {
            eprintln!("gitrev-flags: {}", e);
        }
        std::process::exit(1);
    }
}

fn run<W: Write>(args: &Args, out: &mut W) -> Result<(), Box<dyn std::error::Error>> {
    if args.version {
        gitrev::version::print_cli_version_banner(
            "gitrev-flags",
            env!("CARGO_PKG_VERSION"),
            env!("RELEASE_VERSION"),
            env!("GIT_COMMIT"),
        );
        return Ok(());
    }

    validate_args(args)?;

    let timeout = (args.timeout > 0).then(|| Duration::from_secs(args.timeout));
    let resolver = VersionResolver::new(&args.repo)
        .with_git(&args.git)
        .with_timeout(timeout);

    // Nothing is written until both values are known.
    let version = resolver.resolve()?;
    log::debug!(
        "Resolved {} as tag {} at {}",
        resolver.repo().display(),
        version.tag,
        version.commit
    );

    if args.json {
        let mut line = serde_json::to_string(&version)?;
        line.push('\n');
        out.write_all(line.as_bytes())?;
        out.flush()?;
    } else {
        let names = FlagNames {
            tag: args.tag_define.clone(),
            rev: args.rev_define.clone(),
        };
        BuildFlags::new(&version, &names).write_to(out)?;
    }

    Ok(())
}

fn validate_args(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    for name in [&args.tag_define, &args.rev_define] {
        if !is_define_name(name) {
            return Err(format!("'{}' is not a valid define name", name).into());
        }
    }

    if args.tag_define == args.rev_define {
        return Err("--tag-define and --rev-define must differ".into());
    }

    Ok(())
}

/// C preprocessor identifier: `[A-Za-z_][A-Za-z0-9_]*`.
fn is_define_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            repo: PathBuf::from("."),
            git: "git".to_string(),
            timeout: 10,
            tag_define: DEFAULT_TAG_DEFINE.to_string(),
            rev_define: DEFAULT_REV_DEFINE.to_string(),
            json: false,
            version: false,
        }
    }

    #[test]
    fn no_arguments_matches_defaults() {
        let args = Args::parse_from(["gitrev-flags"]);
        assert_eq!(args.repo, PathBuf::from("."));
        assert_eq!(args.git, "git");
        assert_eq!(args.timeout, 10);
        assert_eq!(args.tag_define, "PIO_SRC_TAG");
        assert_eq!(args.rev_define, "PIO_SRC_REV");
        assert!(!args.json);
    }

    #[test]
    fn repo_short_flag() {
        let args = Args::parse_from(["gitrev-flags", "-C", "/src/firmware", "--timeout", "0"]);
        assert_eq!(args.repo, PathBuf::from("/src/firmware"));
        assert_eq!(args.timeout, 0);
    }

    #[test]
    fn validate_args_accepts_defaults() {
        assert!(validate_args(&base_args()).is_ok());
    }

    #[test]
    fn validate_args_rejects_bad_define_names() {
        for bad in ["", "1ABC", "PIO SRC", "PIO-SRC", "A=B"] {
            let mut args = base_args();
            args.tag_define = bad.to_string();
            let err = validate_args(&args).unwrap_err().to_string();
            assert!(err.contains("not a valid define name"), "got: {}", err);
        }
    }

    #[test]
    fn validate_args_rejects_duplicate_names() {
        let mut args = base_args();
        args.rev_define = args.tag_define.clone();
        let err = validate_args(&args).unwrap_err().to_string();
        assert!(err.contains("must differ"));
    }

    #[test]
    fn is_define_name_cases() {
        assert!(is_define_name("PIO_SRC_TAG"));
        assert!(is_define_name("_private"));
        assert!(is_define_name("v2"));
        assert!(!is_define_name("2v"));
        assert!(!is_define_name("É"));
    }

    #[test]
    fn failed_resolution_writes_nothing() {
        let mut args = base_args();
        args.repo = PathBuf::from("/nonexistent/gitrev/checkout");
        let mut out = Vec::new();

        let err = run(&args, &mut out).unwrap_err().to_string();
        assert!(err.contains("not a git repository"), "got: {}", err);
        assert!(out.is_empty());
    }

    #[test]
    fn invalid_define_fails_before_querying_git() {
        let mut args = base_args();
        args.git = "gitrev-test-no-such-binary-on-path".to_string();
        args.rev_define = "BAD NAME".to_string();
        let mut out = Vec::new();

        let err = run(&args, &mut out).unwrap_err().to_string();
        assert!(err.contains("not a valid define name"), "got: {}", err);
        assert!(out.is_empty());
    }
}

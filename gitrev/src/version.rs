pub fn print_cli_version_banner(tool_name: &str, version: &str, release: &str, commit: &str) {
    print!("{}", version_banner(tool_name, version, release, commit));
}

pub fn version_banner(tool_name: &str, version: &str, release: &str, commit: &str) -> String {
    let mut banner = format!(
        "{tool_name}\nLicense: GNU AGPL v3 (AGPL-3.0-only)\n\n\tVersion:     {version}\n"
    );
    if !release.is_empty() {
        banner.push_str(&format!("\tGit tag:     {release}\n"));
    }
    if !commit.is_empty() {
        banner.push_str(&format!("\tGit commit:  {commit}\n"));
    }
    banner
}

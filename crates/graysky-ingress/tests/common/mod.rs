use std::path::Path;
use std::process::{Command, Output};

/// Run the daemon binary with arguments and a clean configuration environment.
pub fn run_cli(args: &[&str], home: &Path) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_graysky-ingress"));
    cmd.args(args);
    cmd.env("HOME", home);
    cmd.env("XDG_DATA_HOME", home.join("data"));
    cmd.env_remove("FEEDGEN_SUBSCRIPTION_ENDPOINT");
    cmd.env_remove("FEEDGEN_SQLITE_LOCATION");
    cmd.env_remove("FEEDGEN_SUBSCRIPTION_RECONNECT_DELAY");
    cmd.env_remove("RUST_LOG");
    cmd.output().expect("Failed to execute CLI")
}

/// Run the binary and expect it to fail, returning stderr and stdout combined.
pub fn run_cli_failure(args: &[&str], home: &Path) -> String {
    let output = run_cli(args, home);
    if output.status.success() {
        panic!("CLI command should have failed: {:?}", args);
    }
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
    )
}

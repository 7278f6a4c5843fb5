#![allow(dead_code)]

use std::env;
use std::process::{Command, Output};

/// Set in the environment of re-executed test binaries.
pub const CHILD_ENV: &str = "NUDGE_API_CHILD_TEST";

pub fn in_child() -> bool {
    env::var_os(CHILD_ENV).is_some()
}

/// Re-runs this test binary, executing only the ignored test `test_name`.
///
/// Exit-status properties cannot be observed from inside the test runner, so
/// they run in a child process.
pub fn run_child(test_name: &str) -> Output {
    let test_binary = env::current_exe().expect("path of the running test binary");
    Command::new(test_binary)
        .args([
            "--exact",
            test_name,
            "--include-ignored",
            "--nocapture",
            "--test-threads=1",
        ])
        .env(CHILD_ENV, "1")
        .output()
        .expect("failed to spawn child test process")
}

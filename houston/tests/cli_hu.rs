//! CLI tests for `hu`.
//!
//! Spawns the binary against a temporary home directory. Network access is
//! never needed: completions are either unreachable (to test failures) or
//! pre-seeded into the cache.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

use houston::core::types::ScriptSpecification;
use houston::exit_codes;
use houston::generate::ScriptGenerator;
use houston::io::cache::{Cache, FileCache};
use houston::io::config::{DEFAULT_CACHE_LIMIT_BYTES, DEFAULT_MODEL};
use houston::io::reporter::Reporter;
use houston::io::system::os_description;
use houston::test_support::{ScriptedCompleter, TestHome};

const UNREACHABLE_CONFIG: &str = "default_shell = \"bash\"\n\
                                  default_context_shell = \"sh\"\n\n\
                                  [openai]\n\
                                  base_url = \"http://127.0.0.1:9\"\n\
                                  timeout_secs = 5\n";

fn hu(home: &TestHome, cwd: &Path, api_key: Option<&str>, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hu"));
    cmd.current_dir(cwd)
        .env("HOUSTON_HOME", &home.paths.home)
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG")
        .args(args);
    if let Some(key) = api_key {
        cmd.env("OPENAI_API_KEY", key);
    }
    cmd.output().expect("run hu")
}

fn workdir(home: &TestHome) -> std::path::PathBuf {
    let dir = home.root().join("work");
    fs::create_dir_all(&dir).expect("mkdir work");
    dir
}

/// Store `script` as the cached completion for `hu --shell bash <goal>`.
fn seed_cache(home: &TestHome, goal: &str, script: &str) {
    let spec = ScriptSpecification {
        lang: "bash".to_string(),
        goal: goal.to_string(),
        requirements: vec![format!("Must work on {}", os_description())],
    };
    let cache = Cache::File(FileCache::new(
        &home.paths.cache_dir,
        DEFAULT_CACHE_LIMIT_BYTES,
        Arc::new(Reporter::quiet()),
    ));
    let generator = ScriptGenerator::new(ScriptedCompleter::new(&[script]), cache, DEFAULT_MODEL, 1024);
    generator.generate(&spec).expect("seed cache");
}

#[test]
fn help_lists_flags() {
    let output = Command::new(env!("CARGO_BIN_EXE_hu"))
        .arg("--help")
        .output()
        .expect("hu --help");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--dry", "--force", "--context", "--minimal", "--no-cache"] {
        assert!(stdout.contains(flag), "missing {flag} in:\n{stdout}");
    }
}

#[test]
fn missing_api_key_is_a_config_error() {
    let home = TestHome::new().expect("home");
    let work = workdir(&home);
    let output = hu(&home, &work, None, &["-n", "say", "hi"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID_CONFIG));
    assert!(String::from_utf8_lossy(&output.stderr).contains("OPENAI_API_KEY"));
}

#[test]
fn invalid_config_is_a_config_error() {
    let home = TestHome::new().expect("home");
    fs::write(&home.paths.config_path, "default_run_mode = \"sometimes\"\n").expect("write");
    let work = workdir(&home);
    let output = hu(&home, &work, Some("test-key"), &["-n", "say", "hi"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID_CONFIG));
}

#[test]
fn first_run_scaffolds_the_home_directory() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home_dir = temp.path().join("fresh-home");
    let output = Command::new(env!("CARGO_BIN_EXE_hu"))
        .current_dir(temp.path())
        .env("HOUSTON_HOME", &home_dir)
        .env_remove("OPENAI_API_KEY")
        .args(["-n", "say", "hi"])
        .output()
        .expect("run hu");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID_CONFIG));
    assert!(home_dir.join("config.toml").is_file());
    assert!(home_dir.join("trusted_dirs").is_file());
    assert!(home_dir.join("default.ctxt").is_file());
}

#[test]
fn unreachable_provider_fails() {
    let home = TestHome::new().expect("home");
    fs::write(&home.paths.config_path, UNREACHABLE_CONFIG).expect("write");
    let work = workdir(&home);
    let output = hu(
        &home,
        &work,
        Some("test-key"),
        &["-n", "--no-cache", "--minimal", "say", "hi"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERROR:"));
}

#[test]
fn dry_run_prints_cached_script_and_writes_output() {
    let home = TestHome::new().expect("home");
    fs::write(&home.paths.config_path, UNREACHABLE_CONFIG).expect("write");
    seed_cache(&home, "say hi", "echo hi\n");
    let work = workdir(&home);

    let output = hu(
        &home,
        &work,
        Some("test-key"),
        &["-n", "--minimal", "-o", "hi.sh", "say", "hi"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "echo hi\n");
    assert_eq!(
        fs::read_to_string(work.join("hi.sh")).expect("output file"),
        "#!/usr/bin/env bash\necho hi\n"
    );
}

#[test]
fn dry_wins_over_force() {
    let home = TestHome::new().expect("home");
    fs::write(&home.paths.config_path, UNREACHABLE_CONFIG).expect("write");
    seed_cache(&home, "do not run", "exit 9\n");
    let work = workdir(&home);

    let output = hu(&home, &work, Some("test-key"), &["-y", "-n", "do", "not", "run"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&output.stderr).contains("WARNING:"));
}

#[cfg(unix)]
#[test]
fn forced_run_exits_with_the_script_exit_code() {
    let home = TestHome::new().expect("home");
    fs::write(&home.paths.config_path, UNREACHABLE_CONFIG).expect("write");
    seed_cache(&home, "fail on purpose", "echo running\nexit 3\n");
    let work = workdir(&home);

    let output = hu(
        &home,
        &work,
        Some("test-key"),
        &["-y", "--minimal", "fail", "on", "purpose"],
    );

    assert_eq!(output.status.code(), Some(3));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "echo running\nexit 3\nrunning\n"
    );
}

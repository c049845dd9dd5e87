// tests/config_error_handling.rs

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use scantest::config::{ConfigFile, RawConfigFile, load_and_validate, load_from_path};
use scantest::errors::ScantestError;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn full_config_is_loaded_and_validated() {
    let file = write_config(
        r#"
[runner]
python = "python3"
script_dir = "/opt/scanner"
use_dummy = true

[supervisor]
grace_period = "750ms"
max_cleanup_kill_attempts = 3
cleanup_timeout = "2m"

[server]
bind = "0.0.0.0:8080"

[files]
scan_dir = "/var/lib/scans"
"#,
    );

    let cfg = load_and_validate(file.path()).expect("valid config");
    assert_eq!(cfg.runner.python, "python3");
    assert_eq!(
        cfg.runner.effective_script_dir(),
        PathBuf::from("/opt/scanner/dummy")
    );
    assert_eq!(cfg.supervisor.grace_period, Duration::from_millis(750));
    assert_eq!(cfg.supervisor.max_cleanup_kill_attempts, 3);
    assert_eq!(cfg.supervisor.cleanup_timeout, Duration::from_secs(120));
    assert_eq!(cfg.bind.port(), 8080);
    assert_eq!(cfg.scan_dir, PathBuf::from("/var/lib/scans"));
}

#[test]
fn empty_file_gives_defaults() {
    let file = write_config("");
    let cfg = load_and_validate(file.path()).expect("defaults are valid");
    let defaults = ConfigFile::default();

    assert_eq!(cfg.runner, defaults.runner);
    assert_eq!(cfg.supervisor, defaults.supervisor);
    assert_eq!(cfg.bind, defaults.bind);
    assert_eq!(cfg.scan_dir, defaults.scan_dir);
}

#[test]
fn unknown_keys_are_rejected() {
    let file = write_config(
        r#"
[runner]
interpreter = "python3"
"#,
    );
    let err = load_from_path(file.path()).expect_err("unknown key must fail");
    assert!(matches!(err, ScantestError::TomlError(_)), "got {err:?}");
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_and_validate(dir.path().join("nope.toml")).expect_err("missing file");
    assert!(matches!(err, ScantestError::IoError(_)), "got {err:?}");
}

#[test]
fn zero_grace_period_is_rejected() {
    let mut raw = RawConfigFile::default();
    raw.supervisor.grace_period = "0ms".to_string();

    let err = ConfigFile::try_from(raw).expect_err("zero grace");
    assert!(
        matches!(&err, ScantestError::ConfigError(msg) if msg.contains("grace_period")),
        "got {err:?}"
    );
}

#[test]
fn unparsable_grace_period_is_rejected() {
    let mut raw = RawConfigFile::default();
    raw.supervisor.grace_period = "soon".to_string();

    let err = ConfigFile::try_from(raw).expect_err("bad duration");
    assert!(matches!(err, ScantestError::ConfigError(_)), "got {err:?}");
}

#[test]
fn zero_cleanup_kill_attempts_is_rejected() {
    let mut raw = RawConfigFile::default();
    raw.supervisor.max_cleanup_kill_attempts = 0;

    let err = ConfigFile::try_from(raw).expect_err("zero attempts");
    assert!(
        matches!(&err, ScantestError::ConfigError(msg) if msg.contains("max_cleanup_kill_attempts")),
        "got {err:?}"
    );
}

#[test]
fn bad_bind_address_and_empty_python_are_rejected() {
    let mut raw = RawConfigFile::default();
    raw.server.bind = "localhost".to_string();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(ScantestError::ConfigError(_))
    ));

    let mut raw = RawConfigFile::default();
    raw.runner.python = "  ".to_string();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(ScantestError::ConfigError(_))
    ));
}

#[test]
fn zero_cleanup_timeout_is_rejected() {
    let mut raw = RawConfigFile::default();
    raw.supervisor.cleanup_timeout = "0s".to_string();

    let err = ConfigFile::try_from(raw).expect_err("zero cleanup timeout");
    assert!(
        matches!(&err, ScantestError::ConfigError(msg) if msg.contains("cleanup_timeout")),
        "got {err:?}"
    );
}

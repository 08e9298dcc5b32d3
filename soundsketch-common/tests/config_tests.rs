//! Configuration loading integration tests

use soundsketch_common::config::TomlConfig;
use std::io::Write;

#[test]
fn explicit_path_loads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [server]
        port = 9900

        [cache]
        ttl_hours = 6
        "#
    )
    .unwrap();

    let config = TomlConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.server.port, 9900);
    assert_eq!(config.cache.ttl_hours, 6);
    // untouched sections keep their defaults
    assert_eq!(config.search.timeout_secs, 10);
}

#[test]
fn explicit_missing_path_is_an_error() {
    let result = TomlConfig::load(Some(std::path::Path::new(
        "/nonexistent/soundsketch/config.toml",
    )));
    assert!(result.is_err());
}

#[test]
fn malformed_toml_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "this is not toml [[[").unwrap();

    let result = TomlConfig::load(Some(file.path()));
    assert!(result.is_err());
}

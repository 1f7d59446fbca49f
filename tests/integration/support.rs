use dredge::config::{ClientConfig, DiagnosticsConfig};
use std::path::Path;

/// Creates a test configuration with short backoff
pub fn test_config(max_attempts: u32) -> ClientConfig {
    ClientConfig {
        name: "test".to_string(),
        user_agent: "dredge-test/1.0".to_string(),
        max_attempts,
        retry_delay_ms: 10, // Very short for testing
        timeout_secs: 10,
        connect_timeout_secs: 5,
        ..ClientConfig::default()
    }
}

/// Same as [`test_config`] with dumps written under `dir`
pub fn dumping_config(max_attempts: u32, dir: &Path) -> ClientConfig {
    ClientConfig {
        diagnostics: DiagnosticsConfig {
            enabled: true,
            dump_dir: dir.to_path_buf(),
        },
        ..test_config(max_attempts)
    }
}

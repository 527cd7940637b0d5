//! Environment variable parsing utilities.
//!
//! ```
//! use osu_accuracy::env_utils::{env_path, env_var_or};
//!
//! let buffer: usize = env_var_or("OSU_ACCURACY_SPLITTER_BUFFER", 1024 * 1024);
//! let songs = env_path("OSU_PATH").map(|p| p.join("Songs"));
//! ```

use std::path::PathBuf;
use std::str::FromStr;

/// Parse an environment variable into a type that implements `FromStr`.
///
/// Returns `None` if the variable is not set or cannot be parsed.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse an environment variable with a default value.
///
/// Returns the default if the variable is not set or cannot be parsed.
pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// Read an environment variable as a path. Unset or empty yields `None`.
pub fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_parses_and_defaults() {
        std::env::set_var("OSU_ACCURACY_TEST_NUMBER", " 4096 ");
        std::env::set_var("OSU_ACCURACY_TEST_GARBAGE", "lots");

        assert_eq!(env_var::<usize>("OSU_ACCURACY_TEST_NUMBER"), Some(4096));
        assert_eq!(env_var::<usize>("OSU_ACCURACY_TEST_GARBAGE"), None);
        assert_eq!(env_var_or("OSU_ACCURACY_TEST_GARBAGE", 7usize), 7);
        assert_eq!(env_var_or("OSU_ACCURACY_TEST_UNSET", 7usize), 7);
    }

    #[test]
    fn test_env_path_ignores_empty() {
        std::env::set_var("OSU_ACCURACY_TEST_EMPTY_PATH", "");
        std::env::set_var("OSU_ACCURACY_TEST_PATH", "/games/osu!");

        assert_eq!(env_path("OSU_ACCURACY_TEST_EMPTY_PATH"), None);
        assert_eq!(env_path("OSU_ACCURACY_TEST_PATH"), Some(PathBuf::from("/games/osu!")));
        assert_eq!(env_path("OSU_ACCURACY_TEST_UNSET_PATH"), None);
    }
}

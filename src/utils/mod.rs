//! Process-level helpers shared by the library and the command-line tool:
//! the default worker count, peak memory sampling and logger setup.

use log::{
    warn,
    LevelFilter,
};
use once_cell::sync::Lazy;

/// Environment variable overriding the default number of worker threads.
pub const NUM_THREADS_ENV: &str = "ANNOTSORT_NUM_THREADS";

static DEFAULT_THREADS: Lazy<usize> = Lazy::new(|| {
    let from_env = std::env::var(NUM_THREADS_ENV)
        .ok()
        .and_then(|value| {
            match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    warn!(
                        "Ignoring {}={:?}, expected a positive integer",
                        NUM_THREADS_ENV, value
                    );
                    None
                },
            }
        });
    from_env.unwrap_or_else(rayon::current_num_threads)
});

/// Worker count used when a job does not set one.
pub fn default_threads() -> usize { *DEFAULT_THREADS }

/// Peak resident set size of the process in MiB, `None` where the platform
/// does not report it.
#[cfg(unix)]
pub fn max_mem_usage_mb() -> Option<f64> {
    let rusage = unsafe {
        let mut rusage = std::mem::MaybeUninit::<libc::rusage>::uninit();
        if libc::getrusage(libc::RUSAGE_SELF, rusage.as_mut_ptr()) < 0 {
            warn!(
                "getrusage failed: {}",
                std::io::Error::last_os_error()
            );
            return None;
        }
        rusage.assume_init()
    };
    let maxrss = rusage.ru_maxrss as f64;
    // ru_maxrss is in bytes on macOS and in KiB elsewhere
    if cfg!(target_os = "macos") {
        Some(maxrss / 1024.0 / 1024.0)
    }
    else {
        Some(maxrss / 1024.0)
    }
}

#[cfg(not(unix))]
pub fn max_mem_usage_mb() -> Option<f64> { None }

/// Parses a log level name, falling back to `info`.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Installs the process-wide logger at `level`. Returns `false` if a logger
/// was already installed, in which case nothing changes.
pub fn init_logger(level: &str) -> bool {
    pretty_env_logger::formatted_builder()
        .filter_level(parse_level(level))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("trace", LevelFilter::Trace)]
    #[case("DEBUG", LevelFilter::Debug)]
    #[case(" warn ", LevelFilter::Warn)]
    #[case("error", LevelFilter::Error)]
    #[case("verbose", LevelFilter::Info)]
    #[case("", LevelFilter::Info)]
    fn test_parse_level(
        #[case] name: &str,
        #[case] expected: LevelFilter,
    ) {
        assert_eq!(parse_level(name), expected);
    }

    #[test]
    fn test_init_logger_once() {
        init_logger("debug");
        assert!(!init_logger("trace"));
    }

    #[test]
    fn test_default_threads_positive() {
        assert!(default_threads() > 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_max_mem_usage() {
        let mem = max_mem_usage_mb().unwrap();
        assert!(mem > 0.0);
    }
}

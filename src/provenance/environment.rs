//! Collaborators that supply timestamps and environment metadata to
//! [`Provenance`](super::Provenance).

use std::{
    collections::BTreeMap,
    num::NonZeroUsize,
    time::{SystemTime, UNIX_EPOCH},
};

use crossbeam_utils::atomic::AtomicCell;
use hifitime::{Duration, Epoch};
use serde_json::json;

/// An opaque bag of metadata describing where an activity ran.
pub type Environment = BTreeMap<String, serde_json::Value>;

pub trait Clock: Sync + Send {
    fn now(&self) -> Epoch;
}

pub trait EnvironmentProvider: Sync + Send {
    /// Called once for each started activity.
    fn capture(&self) -> Environment;
}

/// The system's wall clock, in UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Epoch {
        let since_unix_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Epoch::from_unix_seconds(since_unix_epoch.as_secs_f64())
    }
}

/// A clock that starts at a fixed time and advances by `step` every time it
/// is read. Successive readings are therefore strictly increasing.
#[derive(Debug)]
pub struct ManualClock {
    start: Epoch,
    step: Duration,
    readings: AtomicCell<u64>,
}

impl ManualClock {
    pub fn new(start: Epoch, step: Duration) -> ManualClock {
        ManualClock {
            start,
            step,
            readings: AtomicCell::new(0),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Epoch {
        let n = self.readings.fetch_add(1);
        self.start + self.step * n as f64
    }
}

/// Environment variables recorded by default, if they are set.
pub const DEFAULT_ENVIRONMENT_VARIABLES: &[&str] = &[
    "PATH",
    "LD_LIBRARY_PATH",
    "DYLD_LIBRARY_PATH",
    "USER",
    "HOME",
    "SHELL",
    "HOSTNAME",
    "RUST_LOG",
    "CONDA_DEFAULT_ENV",
    "CONDA_PREFIX",
];

/// Describes the running process: executable, arguments, working directory,
/// platform, this package's version and a selection of environment
/// variables.
#[derive(Debug, Clone)]
pub struct SystemEnvironment {
    variables: Vec<String>,
}

impl SystemEnvironment {
    /// Record the given environment variables instead of the defaults.
    pub fn with_variables<I, S>(variables: I) -> SystemEnvironment
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SystemEnvironment {
            variables: variables.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for SystemEnvironment {
    fn default() -> Self {
        SystemEnvironment::with_variables(DEFAULT_ENVIRONMENT_VARIABLES.iter().copied())
    }
}

impl EnvironmentProvider for SystemEnvironment {
    fn capture(&self) -> Environment {
        // The command line may not be valid UTF-8; leave it out if so.
        let arguments = std::env::args_os()
            .map(|a| a.into_string())
            .collect::<Result<Vec<String>, _>>()
            .ok();
        let executable = std::env::current_exe()
            .ok()
            .map(|p| p.display().to_string());
        let working_directory = std::env::current_dir()
            .ok()
            .map(|p| p.display().to_string());
        let variables: BTreeMap<&str, String> = self
            .variables
            .iter()
            .filter_map(|name| Some((name.as_str(), std::env::var(name).ok()?)))
            .collect();

        let mut environment = Environment::new();
        environment.insert("executable".to_string(), json!(executable));
        environment.insert("arguments".to_string(), json!(arguments));
        environment.insert("working_directory".to_string(), json!(working_directory));
        environment.insert(
            "platform".to_string(),
            json!({
                "os": std::env::consts::OS,
                "family": std::env::consts::FAMILY,
                "architecture": std::env::consts::ARCH,
                "num_cpus": std::thread::available_parallelism().map(NonZeroUsize::get).ok(),
            }),
        );
        environment.insert(
            "package".to_string(),
            json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }),
        );
        environment.insert("environment".to_string(), json!(variables));
        environment
    }
}

/// Hands out the same metadata for every activity.
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment(pub Environment);

impl EnvironmentProvider for StaticEnvironment {
    fn capture(&self) -> Environment {
        self.0.clone()
    }
}

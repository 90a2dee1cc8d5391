//! Build and test stage definitions.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default build timeout (30 minutes).
pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 1800;

/// Default test timeout (one hour).
pub const DEFAULT_TEST_TIMEOUT_SECS: u64 = 3600;

/// Builtin stages for the supported toolchains.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinStage {
    /// ./gradlew build -x test --no-daemon
    GradleBuild,

    /// ./gradlew test
    GradleTest,

    /// cargo build --workspace --all-targets
    CargoBuild,

    /// cargo test --workspace
    CargoTest,
}

impl BuiltinStage {
    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinStage::GradleBuild => "gradle_build",
            BuiltinStage::GradleTest => "gradle_test",
            BuiltinStage::CargoBuild => "cargo_build",
            BuiltinStage::CargoTest => "cargo_test",
        }
    }

    /// Get the stage's command line.
    pub fn command(&self) -> Vec<String> {
        let argv: &[&str] = match self {
            BuiltinStage::GradleBuild => &["./gradlew", "build", "-x", "test", "--no-daemon"],
            BuiltinStage::GradleTest => &["./gradlew", "test"],
            BuiltinStage::CargoBuild => &["cargo", "build", "--workspace", "--all-targets"],
            BuiltinStage::CargoTest => &["cargo", "test", "--workspace"],
        };
        argv.iter().map(|s| s.to_string()).collect()
    }
}

/// Build tool a repository is built with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Toolchain {
    #[default]
    Gradle,
    Cargo,
}

impl Toolchain {
    pub fn build_stage(&self) -> StageConfig {
        let stage = match self {
            Toolchain::Gradle => BuiltinStage::GradleBuild,
            Toolchain::Cargo => BuiltinStage::CargoBuild,
        };
        StageConfig::from_builtin(stage, DEFAULT_BUILD_TIMEOUT_SECS)
    }

    pub fn test_stage(&self) -> StageConfig {
        let stage = match self {
            Toolchain::Gradle => BuiltinStage::GradleTest,
            Toolchain::Cargo => BuiltinStage::CargoTest,
        };
        StageConfig::from_builtin(stage, DEFAULT_TEST_TIMEOUT_SECS)
    }
}

impl FromStr for Toolchain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gradle" => Ok(Toolchain::Gradle),
            "cargo" => Ok(Toolchain::Cargo),
            other => Err(format!("unknown toolchain {other:?} (expected gradle or cargo)")),
        }
    }
}

/// Configuration for a pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageConfig {
    /// Human-readable stage name.
    pub name: String,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Timeout in seconds.
    pub timeout_secs: u64,
}

impl StageConfig {
    /// Create a stage configuration from a builtin stage.
    pub fn from_builtin(stage: BuiltinStage, timeout_secs: u64) -> Self {
        Self {
            name: stage.name().to_string(),
            command: stage.command(),
            timeout_secs,
        }
    }

    /// Create a custom stage configuration.
    pub fn custom(name: impl Into<String>, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name: name.into(),
            command,
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradle_commands_match_wrapper_invocation() {
        assert_eq!(
            BuiltinStage::GradleBuild.command(),
            vec!["./gradlew", "build", "-x", "test", "--no-daemon"]
        );
        assert_eq!(BuiltinStage::GradleTest.command(), vec!["./gradlew", "test"]);
    }

    #[test]
    fn test_toolchain_presets() {
        let build = Toolchain::Gradle.build_stage();
        assert_eq!(build.name, "gradle_build");
        assert_eq!(build.timeout(), Duration::from_secs(1800));

        let test = Toolchain::Cargo.test_stage();
        assert_eq!(test.command[0], "cargo");
        assert_eq!(test.timeout_secs, DEFAULT_TEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_toolchain_from_str() {
        assert_eq!("Gradle".parse::<Toolchain>().unwrap(), Toolchain::Gradle);
        assert_eq!("cargo".parse::<Toolchain>().unwrap(), Toolchain::Cargo);
        assert!("maven".parse::<Toolchain>().is_err());
    }

    #[test]
    fn test_stage_config_custom() {
        let config = StageConfig::custom("my_stage", vec!["echo".to_string(), "hello".to_string()], 60);
        assert_eq!(config.name, "my_stage");
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }
}

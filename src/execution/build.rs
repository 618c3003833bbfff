//! Build-descriptor validation and build invocation.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use super::command::{CommandError, run_shell};

/// The Maven banner that opens the interesting part of a failed build log.
const MAVEN_FAILURE_BANNER: [&str; 3] = [
    "------------------------------------------------------------------------",
    "BUILD FAILURE",
    "------------------------------------------------------------------------",
];

/// Errors from the build step.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("missing build descriptor ({descriptor})")]
    MissingDescriptor { descriptor: String },

    #[error("build exited with {}", .code.map_or("signal".to_string(), |c| format!("code {c}")))]
    Failed {
        code: Option<i32>,
        /// Failure-relevant tail of the build output.
        tail: Vec<String>,
    },

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Build tool inferred from the configured build command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BuildSystem {
    Maven,
    Gradle,
}

impl BuildSystem {
    /// Infer the build tool from a shell command (`mvn`, `./mvnw`,
    /// `gradle`, `./gradlew`, ...). Commands naming neither yield `None`.
    pub fn detect(command: &str) -> Option<Self> {
        if command.contains("mvn") {
            Some(Self::Maven)
        } else if command.contains("gradle") {
            Some(Self::Gradle)
        } else {
            None
        }
    }

    /// Root descriptor files, any one of which satisfies the check.
    pub fn descriptors(self) -> &'static [&'static str] {
        match self {
            Self::Maven => &["pom.xml"],
            Self::Gradle => &["build.gradle", "build.gradle.kts"],
        }
    }
}

/// Runs the configured build command against a working copy.
#[derive(Debug, Clone)]
pub struct BuildHandler {
    command: String,
    system: Option<BuildSystem>,
    timeout: Option<Duration>,
}

impl BuildHandler {
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        let system = BuildSystem::detect(&command);
        Self {
            command,
            system,
            timeout: None,
        }
    }

    /// Kill the build after `timeout`; the commit then counts as a failed
    /// build.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn system(&self) -> Option<BuildSystem> {
        self.system
    }

    /// Verify the root build descriptor exists in `dir`.
    ///
    /// Skipped when the build tool cannot be inferred from the command.
    pub fn check_descriptor(&self, dir: &Path) -> Result<(), BuildError> {
        let Some(system) = self.system else {
            return Ok(());
        };
        let descriptors = system.descriptors();
        if descriptors.iter().any(|name| dir.join(name).is_file()) {
            Ok(())
        } else {
            Err(BuildError::MissingDescriptor {
                descriptor: descriptors.join(" or "),
            })
        }
    }

    /// Run the build command in `dir`.
    pub async fn build(&self, dir: &Path) -> Result<(), BuildError> {
        debug!(command = %self.command, dir = %dir.display(), "running build");
        let output = match run_shell(&self.command, dir, self.timeout).await {
            Ok(output) => output,
            Err(CommandError::TimedOut { timeout, .. }) => {
                return Err(BuildError::Failed {
                    code: None,
                    tail: vec![format!("build timed out after {timeout:?}")],
                });
            }
            Err(e) => return Err(e.into()),
        };
        if output.success {
            return Ok(());
        }
        Err(BuildError::Failed {
            code: output.code,
            tail: build_failure_tail(&output.lines()),
        })
    }
}

/// Lines from the Maven `BUILD FAILURE` banner onward, or the whole output
/// when no banner is present.
pub fn build_failure_tail(lines: &[&str]) -> Vec<String> {
    let start = lines
        .windows(MAVEN_FAILURE_BANNER.len())
        .position(|window| {
            window
                .iter()
                .zip(MAVEN_FAILURE_BANNER)
                .all(|(line, marker)| line.contains(marker))
        })
        .unwrap_or(0);
    lines[start..].iter().map(|l| l.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_build_tool() {
        assert_eq!(BuildSystem::detect("mvn -q compile"), Some(BuildSystem::Maven));
        assert_eq!(BuildSystem::detect("./mvnw package"), Some(BuildSystem::Maven));
        assert_eq!(BuildSystem::detect("./gradlew build -x test"), Some(BuildSystem::Gradle));
        assert_eq!(BuildSystem::detect("make all"), None);
        assert_eq!(BuildSystem::Gradle.to_string(), "gradle");
    }

    #[test]
    fn maven_requires_pom() {
        let dir = tempfile::tempdir().unwrap();
        let handler = BuildHandler::new("mvn compile");
        let err = handler.check_descriptor(dir.path()).unwrap_err();
        assert_eq!(err.to_string(), "missing build descriptor (pom.xml)");

        std::fs::write(dir.path().join("pom.xml"), "<project/>").unwrap();
        assert!(handler.check_descriptor(dir.path()).is_ok());
    }

    #[test]
    fn gradle_accepts_kotlin_script() {
        let dir = tempfile::tempdir().unwrap();
        let handler = BuildHandler::new("gradle build");
        assert!(matches!(
            handler.check_descriptor(dir.path()),
            Err(BuildError::MissingDescriptor { .. })
        ));
        std::fs::write(dir.path().join("build.gradle.kts"), "").unwrap();
        assert!(handler.check_descriptor(dir.path()).is_ok());
    }

    #[test]
    fn unknown_tool_skips_check() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BuildHandler::new("make").check_descriptor(dir.path()).is_ok());
    }

    #[test]
    fn tail_starts_at_failure_banner() {
        let dash = format!("[INFO] {}", "-".repeat(72));
        let lines = vec![
            "[INFO] Compiling 12 source files",
            dash.as_str(),
            "[INFO] BUILD FAILURE",
            dash.as_str(),
            "[ERROR] Foo.java:[3,1] cannot find symbol",
        ];
        let tail = build_failure_tail(&lines);
        assert_eq!(tail.len(), 4);
        assert_eq!(tail[1], "[INFO] BUILD FAILURE");
        assert_eq!(tail[3], "[ERROR] Foo.java:[3,1] cannot find symbol");
    }

    #[test]
    fn tail_without_banner_is_everything() {
        let lines = vec!["error: one", "error: two"];
        assert_eq!(build_failure_tail(&lines), vec!["error: one", "error: two"]);
    }

    #[tokio::test]
    async fn build_reports_failure_tail() {
        let dir = tempfile::tempdir().unwrap();
        let handler = BuildHandler::new("echo compiling; echo broken >&2; exit 1");
        match handler.build(dir.path()).await {
            Err(BuildError::Failed { code, tail }) => {
                assert_eq!(code, Some(1));
                assert_eq!(tail, vec!["compiling", "broken"]);
            }
            other => panic!("expected build failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timed_out_build_is_a_build_failure() {
        let dir = tempfile::tempdir().unwrap();
        let handler = BuildHandler::new("sleep 5").with_timeout(Some(Duration::from_millis(50)));
        match handler.build(dir.path()).await {
            Err(BuildError::Failed { code, tail }) => {
                assert_eq!(code, None);
                assert_eq!(tail, vec!["build timed out after 50ms"]);
            }
            other => panic!("expected build failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn successful_build() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BuildHandler::new("true").build(dir.path()).await.is_ok());
    }
}

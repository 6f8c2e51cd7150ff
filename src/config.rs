//! Startup configuration.
//!
//! Read once from command-line flags and environment variables, validated,
//! then handed to the service as an immutable value.

use std::path::{Path, PathBuf};

use crate::error::{BslError, BslResult};
use crate::logging::LogLevel;

/// Default JVM heap for analysis runs.
pub const DEFAULT_MEMORY_MB: u32 = 4096;
/// Smallest accepted default heap.
pub const MIN_MEMORY_MB: u32 = 128;
/// Largest accepted default heap.
pub const MAX_MEMORY_MB: u32 = 16384;

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BslConfig {
    /// BSL Language Server jar (absolute).
    pub jar_path: PathBuf,
    /// Explicit Java launcher; `None` means look up `java` on `PATH`.
    pub java_path: Option<PathBuf>,
    /// Heap used when a request does not name one.
    pub default_memory_mb: u32,
    /// Analyzer configuration used when a request does not name one.
    pub config_path: Option<PathBuf>,
    /// Initial log verbosity.
    pub log_level: LogLevel,
}

impl BslConfig {
    /// Configuration with defaults for everything except the jar.
    pub fn new(jar_path: impl Into<PathBuf>) -> BslResult<Self> {
        Ok(Self {
            jar_path: validate_jar(&jar_path.into())?,
            java_path: None,
            default_memory_mb: DEFAULT_MEMORY_MB,
            config_path: None,
            log_level: LogLevel::default(),
        })
    }

    #[must_use]
    pub fn with_java(mut self, java: impl Into<PathBuf>) -> Self {
        self.java_path = Some(java.into());
        self
    }

    pub fn with_default_memory_mb(mut self, memory_mb: u32) -> BslResult<Self> {
        self.default_memory_mb = validate_default_memory(i64::from(memory_mb))?;
        Ok(self)
    }

    pub fn with_config_path(mut self, path: impl AsRef<Path>) -> BslResult<Self> {
        self.config_path = Some(validate_config_path(path.as_ref())?);
        Ok(self)
    }

    /// Build from command-line `args` and an environment lookup.
    ///
    /// Flags win over variables: `--jar`/`BSL_JAR`, `--java`/`BSL_JAVA`,
    /// `--memory-mb`/`BSL_MEMORY_MB`, `--config`/`BSL_CONFIG`,
    /// `--log-level`/`BSL_LOG_LEVEL`. When no launcher is named,
    /// `$JAVA_HOME/bin/java` is used if it exists.
    pub fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> BslResult<Self> {
        let pick = |flag: &str, var: &str| {
            flag_value(args, flag)
                .or_else(|| env(var))
                .filter(|v| !v.trim().is_empty())
        };

        let jar = pick("--jar", "BSL_JAR").ok_or_else(|| {
            BslError::InvalidConfig(
                "BSL Language Server jar is required: pass --jar <path> or set BSL_JAR".to_owned(),
            )
        })?;
        let mut config = Self::new(jar)?;

        config.java_path = pick("--java", "BSL_JAVA").map(PathBuf::from).or_else(|| {
            env("JAVA_HOME")
                .map(|home| Path::new(&home).join("bin").join(java_binary_name()))
                .filter(|p| p.is_file())
        });

        if let Some(raw) = pick("--memory-mb", "BSL_MEMORY_MB") {
            let value: i64 = raw.trim().parse().map_err(|_| {
                BslError::InvalidConfig(format!("memory limit is not an integer: {raw}"))
            })?;
            config.default_memory_mb = validate_default_memory(value)?;
        }

        if let Some(path) = pick("--config", "BSL_CONFIG") {
            config.config_path = Some(validate_config_path(Path::new(&path))?);
        }

        if let Some(level) = pick("--log-level", "BSL_LOG_LEVEL") {
            config.log_level = level.parse()?;
        }

        Ok(config)
    }

    /// Locate the Java launcher for a run.
    pub fn resolve_java(&self) -> BslResult<PathBuf> {
        match &self.java_path {
            Some(path) if path.is_file() => Ok(path.clone()),
            Some(path) => which::which(path).map_err(|e| BslError::ToolNotFound {
                tool: path.display().to_string(),
                reason: e.to_string(),
            }),
            None => which::which("java").map_err(|e| BslError::ToolNotFound {
                tool: "java".to_owned(),
                reason: format!("{e}; install a JRE or set BSL_JAVA / JAVA_HOME"),
            }),
        }
    }
}

const fn java_binary_name() -> &'static str {
    if cfg!(windows) { "java.exe" } else { "java" }
}

/// Value following `flag` in `args`, also accepting `--flag=value`.
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == flag {
            return iter.next().cloned();
        }
        if let Some(rest) = arg.strip_prefix(flag).and_then(|r| r.strip_prefix('=')) {
            return Some(rest.to_owned());
        }
    }
    None
}

fn validate_jar(path: &Path) -> BslResult<PathBuf> {
    if !path.is_file() {
        return Err(BslError::ToolNotFound {
            tool: path.display().to_string(),
            reason: "BSL Language Server jar not found".to_owned(),
        });
    }
    let is_jar = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jar"));
    if !is_jar {
        return Err(BslError::InvalidConfig(format!(
            "not a jar file: {}",
            path.display()
        )));
    }
    std::path::absolute(path).map_err(|source| BslError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn validate_default_memory(value: i64) -> BslResult<u32> {
    let min = i64::from(MIN_MEMORY_MB);
    let max = i64::from(MAX_MEMORY_MB);
    if !(min..=max).contains(&value) {
        return Err(BslError::InvalidMemoryLimit {
            value,
            reason: format!("default must lie in {MIN_MEMORY_MB}..={MAX_MEMORY_MB}"),
        });
    }
    u32::try_from(value).map_err(|e| BslError::InvalidMemoryLimit {
        value,
        reason: e.to_string(),
    })
}

/// Check an analyzer configuration file: it must exist and be `.json`.
pub fn validate_config_path(path: &Path) -> BslResult<PathBuf> {
    if !path.is_file() {
        return Err(BslError::ConfigNotFound {
            path: path.to_path_buf(),
            reason: "file does not exist".to_owned(),
        });
    }
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if !is_json {
        return Err(BslError::ConfigNotFound {
            path: path.to_path_buf(),
            reason: "configuration must be a .json file".to_owned(),
        });
    }
    std::path::absolute(path).map_err(|source| BslError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn fake_jar(dir: &Path) -> PathBuf {
        let jar = dir.join("bsl-language-server.jar");
        std::fs::write(&jar, b"PK").expect("write jar");
        jar
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_jar_setting_is_fatal() {
        let err = BslConfig::from_sources(&[], env_of(&[])).expect_err("must fail");
        assert!(matches!(err, BslError::InvalidConfig(_)));
    }

    #[test]
    fn nonexistent_jar_is_fatal() {
        let err = BslConfig::from_sources(&[], env_of(&[("BSL_JAR", "/no/such/bsl.jar")]))
            .expect_err("must fail");
        assert!(matches!(err, BslError::ToolNotFound { .. }));
    }

    #[test]
    fn non_jar_extension_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("server.zip");
        std::fs::write(&file, b"x").expect("write");
        let err = BslConfig::new(&file).expect_err("must fail");
        assert!(matches!(err, BslError::InvalidConfig(_)));
    }

    #[test]
    fn flags_override_environment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let jar = fake_jar(dir.path());
        let args = vec![
            "--jar".to_owned(),
            jar.display().to_string(),
            "--memory-mb=2048".to_owned(),
        ];
        let config = BslConfig::from_sources(
            &args,
            env_of(&[
                ("BSL_JAR", "/ignored.jar"),
                ("BSL_MEMORY_MB", "8192"),
                ("BSL_LOG_LEVEL", "debug"),
            ]),
        )
        .expect("config");

        assert_eq!(config.jar_path, jar);
        assert_eq!(config.default_memory_mb, 2048);
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn memory_bounds_enforced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let jar = fake_jar(dir.path()).display().to_string();
        for bad in ["64", "20000", "lots"] {
            let result = BslConfig::from_sources(
                &[],
                env_of(&[("BSL_JAR", jar.as_str()), ("BSL_MEMORY_MB", bad)]),
            );
            assert!(result.is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn config_path_must_be_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let yaml = dir.path().join("cfg.yaml");
        std::fs::write(&yaml, "a: 1").expect("write");
        assert!(matches!(
            validate_config_path(&yaml),
            Err(BslError::ConfigNotFound { .. })
        ));
        assert!(matches!(
            validate_config_path(&dir.path().join("missing.json")),
            Err(BslError::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn explicit_missing_java_reports_tool_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = BslConfig::new(fake_jar(dir.path()))
            .expect("config")
            .with_java(dir.path().join("no-such-java"));
        assert!(matches!(
            config.resolve_java(),
            Err(BslError::ToolNotFound { .. })
        ));
    }
}

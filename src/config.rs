//! Configuration
//!
//! `ShellConfig` is read from TOML and turned into a [`Shell`]:
//!
//! ```toml
//! cwd = "/srv/app"
//! inherit_env = false
//! pipefail = true
//! glob_policy = "fail"
//! kill_grace_ms = 500
//!
//! [env]
//! PATH = "/usr/bin:/bin"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interpreter::types::{ExecutionLimits, GlobPolicy, PipelineExitPolicy, ShellOptions};
use crate::shell::Shell;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    /// Working directory; the process's when unset
    pub cwd: Option<PathBuf>,
    /// Start from the process environment before applying `env`
    pub inherit_env: bool,
    pub env: HashMap<String, String>,
    pub throw_on_nonzero_exit: bool,
    pub pipefail: bool,
    pub glob_policy: GlobPolicy,
    pub strict_variables: bool,
    pub continue_on_substitution_error: bool,
    pub quiet: bool,
    pub max_expansion_words: u64,
    pub max_substitution_depth: usize,
    pub kill_grace_ms: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        let options = ShellOptions::default();
        let limits = ExecutionLimits::default();
        Self {
            cwd: None,
            inherit_env: true,
            env: HashMap::new(),
            throw_on_nonzero_exit: options.throw_on_nonzero_exit,
            pipefail: options.pipeline_exit_policy == PipelineExitPolicy::Pipefail,
            glob_policy: options.glob_policy,
            strict_variables: options.strict_variables,
            continue_on_substitution_error: options.continue_on_substitution_error,
            quiet: options.quiet,
            max_expansion_words: limits.max_expansion_words,
            max_substitution_depth: limits.max_substitution_depth,
            kill_grace_ms: limits.kill_grace.as_millis() as u64,
        }
    }
}

impl ShellConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn options(&self) -> ShellOptions {
        ShellOptions {
            throw_on_nonzero_exit: self.throw_on_nonzero_exit,
            pipeline_exit_policy: if self.pipefail {
                PipelineExitPolicy::Pipefail
            } else {
                PipelineExitPolicy::LastStage
            },
            glob_policy: self.glob_policy,
            strict_variables: self.strict_variables,
            continue_on_substitution_error: self.continue_on_substitution_error,
            quiet: self.quiet,
        }
    }

    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            max_expansion_words: self.max_expansion_words,
            max_substitution_depth: self.max_substitution_depth,
            kill_grace: Duration::from_millis(self.kill_grace_ms),
        }
    }

    pub fn into_shell(self) -> Shell {
        let options = self.options();
        let limits = self.limits();

        let base = if self.inherit_env {
            Shell::new()
        } else {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
            Shell::with_env(cwd, HashMap::new())
        };
        let shell = base.envs(self.env).options(options).limits(limits);
        match self.cwd {
            Some(cwd) => shell.cwd(cwd),
            None => shell,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ShellConfig::from_toml_str("").unwrap();
        assert_eq!(config, ShellConfig::default());
        assert!(config.inherit_env);
        assert_eq!(config.max_expansion_words, 1 << 20);
        assert_eq!(config.kill_grace_ms, 250);
    }

    #[test]
    fn test_full_config() {
        let config = ShellConfig::from_toml_str(
            r#"
            cwd = "/tmp"
            inherit_env = false
            throw_on_nonzero_exit = false
            pipefail = true
            glob_policy = "fail"
            strict_variables = true
            max_expansion_words = 1000
            max_substitution_depth = 4
            kill_grace_ms = 50

            [env]
            GREETING = "hello"
            "#,
        )
        .unwrap();

        let options = config.options();
        assert!(!options.throw_on_nonzero_exit);
        assert_eq!(options.pipeline_exit_policy, PipelineExitPolicy::Pipefail);
        assert_eq!(options.glob_policy, GlobPolicy::Fail);
        assert!(options.strict_variables);

        let limits = config.limits();
        assert_eq!(limits.max_expansion_words, 1000);
        assert_eq!(limits.max_substitution_depth, 4);
        assert_eq!(limits.kill_grace, Duration::from_millis(50));

        let shell = config.into_shell();
        assert_eq!(shell.current_dir(), &PathBuf::from("/tmp"));
        assert_eq!(shell.execution_limits().max_substitution_depth, 4);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ShellConfig::from_toml_str("pipefial = true").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_bad_glob_policy_rejected() {
        assert!(ShellConfig::from_toml_str("glob_policy = \"sometimes\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shell.toml");
        std::fs::write(&path, "pipefail = true\n").unwrap();
        assert!(ShellConfig::load(&path).unwrap().pipefail);

        let err = ShellConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_env_applied_to_commands() {
        let config = ShellConfig::from_toml_str("[env]\nCONFIGURED = \"yes\"\n").unwrap();
        let out = config.into_shell().command("echo $CONFIGURED").text().await.unwrap();
        assert_eq!(out, "yes\n");
    }
}

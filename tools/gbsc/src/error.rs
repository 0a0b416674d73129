use std::path::{Path, PathBuf};

use gbsc_core::CompileError;
use thiserror::Error;

pub type Result<T, E = BuildError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BuildError {
    /// The build was stopped through its [`BuildContext`](crate::BuildContext).
    #[error("BUILD_CANCELLED")]
    Cancelled,

    #[error(
        "{toolchain} not found (looked in {}). Install it and set {env} to the install directory.",
        list_paths(.searched)
    )]
    ToolchainNotFound {
        toolchain: &'static str,
        env: &'static str,
        searched: Vec<PathBuf>,
    },

    #[error("{tool} failed ({status})\n{output}")]
    ToolFailed {
        tool: String,
        status: String,
        output: String,
    },

    #[error(transparent)]
    Compile(CompileError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("object cache: {0}")]
    Cache(String),
}

fn list_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "no candidate locations".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<CompileError> for BuildError {
    fn from(error: CompileError) -> Self {
        match error {
            CompileError::Interrupted => BuildError::Cancelled,
            other => BuildError::Compile(other),
        }
    }
}

impl BuildError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        BuildError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn io_path(action: &str, path: &Path, source: std::io::Error) -> Self {
        BuildError::Io {
            context: format!("failed to {} {}", action, path.display()),
            source,
        }
    }

    /// True when `error`, or anything in its cause chain, is a cancellation.
    pub fn is_cancelled(error: &anyhow::Error) -> bool {
        error
            .chain()
            .any(|cause| matches!(cause.downcast_ref::<BuildError>(), Some(BuildError::Cancelled)))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn cancellation_is_found_behind_context() {
        let result: anyhow::Result<()> = Err(BuildError::Cancelled).context("linking ROM");
        let error = result.unwrap_err();
        assert!(BuildError::is_cancelled(&error));
        assert_eq!(error.root_cause().to_string(), "BUILD_CANCELLED");

        let other = anyhow::Error::new(BuildError::Cache("corrupt entry".into()));
        assert!(!BuildError::is_cancelled(&other));
    }

    #[test]
    fn interrupted_compile_becomes_cancellation() {
        assert!(matches!(
            BuildError::from(CompileError::Interrupted),
            BuildError::Cancelled
        ));
        assert!(matches!(
            BuildError::from(CompileError::NoScenes),
            BuildError::Compile(CompileError::NoScenes)
        ));
    }

    #[test]
    fn missing_toolchain_names_the_variable() {
        let error = BuildError::ToolchainNotFound {
            toolchain: "devkitPro",
            env: "DEVKITPRO",
            searched: vec![PathBuf::from("/opt/devkitpro")],
        };
        let message = error.to_string();
        assert!(message.contains("/opt/devkitpro"));
        assert!(message.contains("set DEVKITPRO"));
    }
}

use std::path::Path;

use thiserror::Error;

pub type Result<T, E = CompileError> = std::result::Result<T, E>;

/// Fatal errors raised while compiling a project into engine sources.
///
/// Anything recoverable is reported as a warning through
/// [`Reporter`](crate::Reporter) instead.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(
        "No scenes are included in your project. Add some scenes in the Game World editor and try again."
    )]
    NoScenes,

    #[error("Error in scene '{scene}' : has missing or no background assigned.")]
    MissingBackground { scene: String },

    #[error(
        "No fonts are available. A default font has been added to assets/fonts, add it to the project and try again."
    )]
    MissingFonts,

    #[error("generated file '{filename}' was produced twice")]
    DuplicateArtifact { filename: String },

    #[error("failed to encode {asset}: {source}")]
    Encode {
        asset: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("compilation interrupted")]
    Interrupted,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid project data: {0}")]
    Project(#[from] serde_json::Error),
}

impl CompileError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CompileError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn io_path(action: &str, path: &Path, source: std::io::Error) -> Self {
        CompileError::Io {
            context: format!("failed to {} {}", action, path.display()),
            source,
        }
    }

    pub fn encode(
        asset: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        CompileError::Encode {
            asset: asset.into(),
            source: source.into(),
        }
    }
}

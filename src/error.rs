use std::time::Duration;

use thiserror::Error;

use crate::languages::Language;
use crate::pipeline::Stage;

/// Task-level failures. Anything that surfaces here aborts the task and no
/// partial scene is produced.
#[derive(Debug, Error)]
pub enum PicTransError {
    #[error("unsupported language code '{0}'")]
    UnsupportedLanguage(String),

    #[error("no replacement policy registered for {} -> {}", .from.code(), .to.code())]
    UnsupportedLanguagePair { from: Language, to: Language },

    #[error("{stage} failed: {source:#}")]
    Collaborator {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stage} timed out after {:.1}s", .after.as_secs_f32())]
    Timeout { stage: Stage, after: Duration },

    #[error("translator returned {got} lines for {expected} inputs")]
    TranslationMismatch { expected: usize, got: usize },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl PicTransError {
    pub fn collaborator(stage: Stage, source: anyhow::Error) -> Self {
        Self::Collaborator { stage, source }
    }

    /// Whether the failure came from an external collaborator rather than
    /// from the request itself.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            Self::Collaborator { .. } | Self::Timeout { .. } | Self::TranslationMismatch { .. }
        )
    }
}

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::error::PicTransError;

/// Task states, in the order a task moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Detecting,
    /// Drops numbers, weights and prices before translation.
    FilteringDetections,
    Translating,
    /// Drops regions whose translation came back unchanged.
    FilteringTranslations,
    Erasing,
    Composing,
    Done,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Detecting,
        Stage::FilteringDetections,
        Stage::Translating,
        Stage::FilteringTranslations,
        Stage::Erasing,
        Stage::Composing,
        Stage::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Detecting => "detecting",
            Stage::FilteringDetections => "filtering_detections",
            Stage::Translating => "translating",
            Stage::FilteringTranslations => "filtering_translations",
            Stage::Erasing => "erasing",
            Stage::Composing => "composing",
            Stage::Done => "done",
        }
    }

    /// The state after this one; `Done` is terminal.
    pub fn next(self) -> Option<Stage> {
        let index = Stage::ALL.iter().position(|stage| *stage == self)?;
        Stage::ALL.get(index + 1).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run one collaborator call under a deadline and tag any failure with the
/// stage it happened in.
pub async fn guarded<T, F>(stage: Stage, after: Duration, call: F) -> Result<T, PicTransError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(PicTransError::collaborator(stage, err)),
        Err(_) => Err(PicTransError::Timeout { stage, after }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_run_in_order_and_end_at_done() {
        let mut walked = vec![Stage::Detecting];
        while let Some(next) = walked.last().and_then(|stage| stage.next()) {
            walked.push(next);
        }
        assert_eq!(walked, Stage::ALL);
        assert_eq!(Stage::FilteringDetections.to_string(), "filtering_detections");
        assert_eq!(Stage::FilteringTranslations.to_string(), "filtering_translations");
    }

    #[tokio::test]
    async fn slow_calls_become_timeouts() {
        let result = guarded(Stage::Erasing, Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, anyhow::Error>(())
        })
        .await;
        assert!(matches!(
            result,
            Err(PicTransError::Timeout {
                stage: Stage::Erasing,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn failures_carry_their_stage() {
        let result: Result<(), _> = guarded(Stage::Translating, Duration::from_secs(1), async {
            Err(anyhow::anyhow!("upstream 500"))
        })
        .await;
        let err = result.unwrap_err();
        assert!(err.is_collaborator_failure());
        assert_eq!(err.to_string(), "translating failed: upstream 500");
    }
}

//! Per-run stage tracking.

use std::fmt;

use tracing::debug;

use crate::derivative::AssetId;
use crate::diagnostics::OperationKind;

use super::error::PipelineError;

/// Where a generation run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    NeedSource,
    SourceLoaded,
    Compressed,
    Persisted,
    MetadataUpdated,
    Notified,
    Failed,
}

impl Stage {
    /// Whether a run may move from `self` to `next`.
    ///
    /// A multi-output run loops `Compressed -> Persisted` once per
    /// derivative. A run whose outputs already exist goes straight from
    /// `NeedSource` to `MetadataUpdated`.
    pub fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        if next == Failed {
            return !matches!(self, Failed | Notified);
        }
        matches!(
            (self, next),
            (NeedSource, SourceLoaded)
                | (NeedSource, MetadataUpdated)
                | (SourceLoaded, Compressed)
                | (SourceLoaded, MetadataUpdated)
                | (Compressed, Persisted)
                | (Persisted, Compressed)
                | (Persisted, MetadataUpdated)
                | (MetadataUpdated, Notified)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Notified | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::NeedSource => "need_source",
            Stage::SourceLoaded => "source_loaded",
            Stage::Compressed => "compressed",
            Stage::Persisted => "persisted",
            Stage::MetadataUpdated => "metadata_updated",
            Stage::Notified => "notified",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Follows one run through its stages.
#[derive(Debug)]
pub struct StageTracker {
    asset_id: AssetId,
    operation: OperationKind,
    stage: Stage,
}

impl StageTracker {
    pub fn new(asset_id: AssetId, operation: OperationKind) -> Self {
        Self {
            asset_id,
            operation,
            stage: Stage::NeedSource,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    /// Move to `next`, or fail with `IllegalTransition` and stay put.
    pub fn advance(&mut self, next: Stage) -> Result<(), PipelineError> {
        if !self.stage.can_advance_to(next) {
            return Err(PipelineError::IllegalTransition {
                from: self.stage,
                to: next,
            });
        }
        debug!(
            asset_id = self.asset_id,
            operation = %self.operation,
            from = %self.stage,
            to = %next,
            "Stage transition"
        );
        self.stage = next;
        Ok(())
    }

    /// Mark the run failed. Repeated calls are ignored.
    pub fn fail(&mut self) {
        if self.stage != Stage::Failed {
            debug!(
                asset_id = self.asset_id,
                operation = %self.operation,
                from = %self.stage,
                "Run failed"
            );
            self.stage = Stage::Failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_thumb_run() {
        let mut tracker = StageTracker::new(1, OperationKind::CreateThumb);
        for stage in [
            Stage::SourceLoaded,
            Stage::Compressed,
            Stage::Persisted,
            Stage::Compressed,
            Stage::Persisted,
            Stage::MetadataUpdated,
            Stage::Notified,
        ] {
            tracker.advance(stage).unwrap();
        }
        assert!(tracker.stage().is_terminal());
    }

    #[test]
    fn test_rejects_skipping_persist() {
        let mut tracker = StageTracker::new(1, OperationKind::CreateLcd);
        tracker.advance(Stage::SourceLoaded).unwrap();
        tracker.advance(Stage::Compressed).unwrap();
        let err = tracker.advance(Stage::Notified).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::IllegalTransition {
                from: Stage::Compressed,
                to: Stage::Notified
            }
        ));
        assert_eq!(tracker.stage(), Stage::Compressed);
    }

    #[test]
    fn test_no_transition_out_of_terminal() {
        let mut tracker = StageTracker::new(1, OperationKind::CreateLcd);
        tracker.fail();
        assert!(tracker.advance(Stage::SourceLoaded).is_err());
        assert!(!Stage::Notified.can_advance_to(Stage::Failed));
    }

    #[test]
    fn test_existing_outputs_shortcut() {
        let mut tracker = StageTracker::new(1, OperationKind::CreateThumb);
        tracker.advance(Stage::MetadataUpdated).unwrap();
        tracker.advance(Stage::Notified).unwrap();
    }
}

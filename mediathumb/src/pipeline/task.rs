//! Worker-pool task wrapping one pipeline call.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::derivative::{AssetDerivativeRequest, BatchId};
use crate::worker::PoolTask;

use super::GenerationPipeline;

/// Which pipeline operation a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerateAction {
    Lcd,
    Thumb,
    ThumbFromSource,
    LcdAndThumb,
    /// Rebuild compressed and tiny kinds from existing derivatives
    Compressed,
    /// Rebuild from the THM_EX scratch
    CompressedEx,
}

impl GenerateAction {
    /// Whether a failure should flag the asset's THUMB for retry.
    pub fn produces_thumb(self) -> bool {
        !matches!(self, GenerateAction::Lcd)
    }
}

impl fmt::Display for GenerateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerateAction::Lcd => "lcd",
            GenerateAction::Thumb => "thumb",
            GenerateAction::ThumbFromSource => "thumb_from_source",
            GenerateAction::LcdAndThumb => "lcd_and_thumb",
            GenerateAction::Compressed => "compressed",
            GenerateAction::CompressedEx => "compressed_ex",
        };
        f.write_str(name)
    }
}

impl GenerationPipeline {
    /// Run `action` for `request`.
    pub fn execute(&self, action: GenerateAction, request: &AssetDerivativeRequest) -> bool {
        match action {
            GenerateAction::Lcd => self.create_lcd(request),
            GenerateAction::Thumb => self.create_thumb_or_reload(request),
            GenerateAction::ThumbFromSource => self.create_thumb_from_source(request),
            GenerateAction::LcdAndThumb => self.create_lcd_and_thumb(request),
            GenerateAction::Compressed => self.create_compressed_from_existing(request),
            GenerateAction::CompressedEx => self.create_compressed_from_existing_ex(request),
        }
    }
}

/// A queued pipeline call.
pub struct GenerateTask {
    pipeline: Arc<GenerationPipeline>,
    action: GenerateAction,
    request: AssetDerivativeRequest,
}

impl GenerateTask {
    pub fn new(
        pipeline: Arc<GenerationPipeline>,
        action: GenerateAction,
        request: AssetDerivativeRequest,
    ) -> Self {
        Self {
            pipeline,
            action,
            request,
        }
    }

    pub fn action(&self) -> GenerateAction {
        self.action
    }

    pub fn request(&self) -> &AssetDerivativeRequest {
        &self.request
    }
}

impl fmt::Debug for GenerateTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerateTask")
            .field("action", &self.action)
            .field("asset_id", &self.request.asset_id)
            .field("batch_id", &self.request.batch_id)
            .finish()
    }
}

impl PoolTask for GenerateTask {
    fn batch_id(&self) -> Option<BatchId> {
        self.request.batch_id
    }

    fn run(self) {
        let ok = self.pipeline.execute(self.action, &self.request);
        debug!(
            asset_id = self.request.asset_id,
            action = %self.action,
            ok,
            "Task finished"
        );
        if !ok && self.action.produces_thumb() {
            self.pipeline.mark_failed(&self.request);
        }
    }
}

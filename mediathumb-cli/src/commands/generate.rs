//! Single-asset generation command.

use mediathumb::derivative::{AssetId, DerivativeKind};
use mediathumb::worker::TaskPriority;

use super::common::GenerateKind;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Generate derivatives for one asset on the calling thread.
pub fn run(runner: &CliRunner, asset_id: AssetId, kind: GenerateKind) -> Result<(), CliError> {
    runner.log_startup("generate");
    let service = runner.create_service()?;
    let pipeline = service.pipeline();

    let record = pipeline
        .metadata()
        .record(asset_id)?
        .ok_or(CliError::AssetNotFound(asset_id))?;
    let request = record.to_request().with_priority(TaskPriority::High);

    println!("Generating {:?} for asset {}", kind, asset_id);
    println!("  Source: {}", request.source_path.display());

    let (step, succeeded) = match kind {
        GenerateKind::Lcd => ("LCD", pipeline.create_lcd(&request)),
        GenerateKind::Thumb => ("THUMB", pipeline.create_thumb_or_reload(&request)),
        GenerateKind::Astc => (
            "Compressed THUMB",
            pipeline.create_compressed_from_existing(&request),
        ),
        GenerateKind::All => ("LCD and THUMB", pipeline.create_lcd_and_thumb(&request)),
    };

    if !succeeded {
        return Err(CliError::Generation {
            asset_id,
            step: step.to_string(),
        });
    }

    let store = pipeline.store();
    for derivative in DerivativeKind::ALL {
        if derivative.tiny_side().is_some() {
            continue;
        }
        if let (Ok(path), Some(size)) = (
            store.path_for(&request.source_path, derivative),
            store.file_size(&request.source_path, derivative),
        ) {
            println!("  {:<16} {} ({} bytes)", derivative.to_string(), path.display(), size);
        }
    }

    service.shutdown();
    Ok(())
}

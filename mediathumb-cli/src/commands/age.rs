//! LCD aging command.

use mediathumb::time::format_millis;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Candidates listed by a dry run before the output is summarized.
const DRY_RUN_LIST_LIMIT: usize = 20;

/// Run one aging pass, or list what it would remove.
pub fn run(runner: &CliRunner, dry_run: bool) -> Result<(), CliError> {
    runner.log_startup("age");
    let service = runner.create_service()?;
    let aging = service.aging();
    let threshold = aging.policy().lcd_aging_threshold;

    if dry_run {
        let pending = aging.pending_lcd()?;
        if pending.is_empty() {
            println!("LCD count is within the aging threshold ({}).", threshold);
            return Ok(());
        }

        println!(
            "[DRY RUN] {} LCDs over the threshold ({}) would be removed:",
            pending.len(),
            threshold
        );
        for candidate in pending.iter().take(DRY_RUN_LIST_LIMIT) {
            println!(
                "  {:>8}  {}  {}",
                candidate.asset_id,
                format_millis(candidate.lcd_visit_time),
                candidate.source_path.display()
            );
        }
        if pending.len() > DRY_RUN_LIST_LIMIT {
            println!("  ... and {} more", pending.len() - DRY_RUN_LIST_LIMIT);
        }
        return Ok(());
    }

    let result = service.run_aging()?;
    if result.is_noop() {
        println!(
            "Nothing to age: {} LCDs (threshold {}).",
            result.lcd_count_before, threshold
        );
    } else {
        println!("Aging finished in {} ms", result.duration_ms);
        println!("  LCDs before:       {}", result.lcd_count_before);
        println!("  LCDs removed:      {}", result.lcd_removed);
        println!("  Failed:            {}", result.lcd_failed);
        println!("  Skipped in flight: {}", result.skipped_in_flight);
        println!("  Scratch removed:   {}", result.scratch_dirs_removed);
    }

    service.shutdown();
    Ok(())
}

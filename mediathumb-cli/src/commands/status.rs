//! Status command: summary of the derivative cache.

use mediathumb::config::format_size;

use crate::error::CliError;
use crate::runner::CliRunner;

pub fn run(runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("status");
    let service = runner.create_service()?;
    let config = service.config();
    let status = service.status()?;

    println!("mediathumb v{}", mediathumb::VERSION);
    println!();
    println!("Storage");
    println!("  Root:        {}", config.storage.root.display());
    println!("  Database:    {}", config.storage.database.display());
    match &config.storage.kv_database {
        Some(path) => println!("  Tiny store:  {}", path.display()),
        None => println!("  Tiny store:  (disabled)"),
    }
    println!(
        "  SQLite page cache: {}",
        format_size(config.storage.sqlite_cache_size)
    );
    println!();
    println!("LCDs");
    println!("  Count:             {}", status.lcd_count);
    println!("  Aging threshold:   {}", config.aging.lcd_aging_threshold);
    println!("  Generate threshold: {}", config.aging.lcd_generate_threshold);
    println!();
    println!("Workers");
    println!(
        "  Threads:     {} foreground, {} background",
        config.workers.foreground_threads, config.workers.background_threads
    );
    println!("  Queued:      {}", status.queued_tasks);
    println!("  In flight:   {}", status.in_flight);

    service.shutdown();
    Ok(())
}

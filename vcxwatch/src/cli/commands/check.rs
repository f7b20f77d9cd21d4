//! Check command - validate configuration and show what it resolves to

use anyhow::Result;
use std::path::Path;
use vcxwatch_core::Config;

pub fn execute(config: &Config) -> Result<()> {
    println!("Configuration:");
    println!("  Project root:      {}", config.project_root().display());
    for descriptor in config.descriptors() {
        println!("  Descriptor:        {}{}", descriptor.display(), missing(&descriptor));
    }
    for root in config.watch_roots() {
        println!("  Watching:          {}", root.display());
    }
    println!("  Extensions:        {}", config.watch_extensions.join(" "));
    println!(
        "  Debounce:          {} ms ({} ms for descriptor changes)",
        config.debounce_ms, config.trigger_debounce_ms
    );
    println!("  Cache:             {}", config.cache_path().display());
    if let Some(dir) = config.backup_path() {
        println!("  Backups:           {}", dir.display());
    }
    if let Some(file) = config.report_path() {
        println!("  Report:            {}", file.display());
    }
    match config.patrol_interval() {
        Some(_) => {
            println!("  Patrol:            every {} minutes", config.patrol_interval_minutes)
        }
        None => println!("  Patrol:            at startup only"),
    }
    println!("  Pre-gen delete:    {}", config.pre_generation_delete);
    println!("  Max safe delete:   {}", config.max_safe_delete);
    println!("  Dry run:           {}", config.dry_run);
    match config.command_generator() {
        Some(generator) => println!(
            "  Generator:         {} (timeout {}s)",
            generator.command_line(),
            config.generator.timeout_secs
        ),
        None => println!("  Generator:         not set"),
    }

    config.validate()?;
    println!("\nConfiguration is valid.");
    Ok(())
}

fn missing(path: &Path) -> &'static str {
    if path.is_file() { "" } else { "  (missing)" }
}

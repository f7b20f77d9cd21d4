//! Orphans command - list watched files that no descriptor references

use anyhow::{Result, bail};
use vcxwatch_core::Config;
use vcxwatch_core::monitor::EventFilter;
use vcxwatch_core::reconcile::reader::read_all;
use vcxwatch_core::reconcile::{VcxprojReader, find_orphans};

pub fn execute(config: &Config) -> Result<()> {
    let descriptors = config.descriptors();
    let Some(referenced) = read_all(&VcxprojReader::new(), &descriptors) else {
        bail!("Project descriptors could not be read: {:?}", descriptors);
    };

    let monitor = config.monitor_config();
    let filter = EventFilter::new(&monitor);
    let orphans = find_orphans(&monitor.watch_roots, &filter, &referenced);

    if orphans.is_empty() {
        println!("All {} watched files are referenced by the project.", referenced.len());
        return Ok(());
    }

    println!("{} files are not referenced by the project:", orphans.len());
    for path in &orphans {
        println!("  {}", path.display());
    }
    Ok(())
}

//! `skinsync list` – rescan and print all skins.

use anyhow::Result;
use skinsync_core::skins::{RefreshEvent, SkinCatalog, SkinSource};

pub fn run_list(mut catalog: SkinCatalog) -> Result<()> {
    let mut failed = 0usize;
    catalog.refresh(|event| {
        if let RefreshEvent::Failed { name, error } = event {
            eprintln!("skipped {}: {}", name, error);
            failed += 1;
        }
    });

    println!("{:<6} {:<24} {:<10} {}", "INDEX", "NAME", "SIZE", "SOURCE");
    for (i, skin) in catalog.skins().iter().enumerate() {
        let source = match skin.source() {
            SkinSource::Local(p) => p.display().to_string(),
            SkinSource::Downloaded(p) => format!("{} (downloaded)", p.display()),
            SkinSource::Builtin => "built-in".to_string(),
        };
        println!(
            "{:<6} {:<24} {:<10} {}",
            i,
            skin.name(),
            format!("{}x{}", skin.width(), skin.height()),
            source
        );
    }
    if failed > 0 {
        println!("{} skin(s) failed to load", failed);
    }
    Ok(())
}

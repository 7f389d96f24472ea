//! `skinsync find` – look up a skin, downloading it if asked to.

use anyhow::{bail, Result};
use skinsync_core::skins::SkinCatalog;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub async fn run_find(
    mut catalog: SkinCatalog,
    name: &str,
    download: bool,
    wait_secs: u64,
) -> Result<()> {
    catalog.refresh(|_| {});

    let found = if download {
        let deadline = Instant::now() + Duration::from_secs(wait_secs);
        loop {
            if let Some(i) = catalog.find_or_download(name) {
                break Some(i);
            }
            if catalog.pending_downloads() == 0 || Instant::now() >= deadline {
                break None;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    } else {
        catalog.find(name)
    };

    match found.and_then(|i| catalog.get(i).map(|s| (i, s))) {
        Some((i, skin)) => {
            println!("{} {} {}x{}", i, skin.name(), skin.width(), skin.height());
            let [r, g, b] = skin.blood_color();
            tracing::debug!(skin = skin.name(), "blood color {:.3} {:.3} {:.3}", r, g, b);
            Ok(())
        }
        None => match catalog.download_state(name) {
            Some(state) => bail!("skin {:?} not available (download {:?})", name, state),
            None => bail!("skin {:?} not found", name),
        },
    }
}

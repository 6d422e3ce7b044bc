// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation-file bookkeeping for size-based rollover.
//!
//! Rolled logs live next to the live file as `<name>_1`, `<name>_2`, ...
//! where `_1` is the newest generation. A roll purges the oldest generations
//! down to the configured cap, shifts the survivors up by one, and moves the
//! live file into the `_1` slot.

use std::path::{Path, PathBuf};

use sluice_core::SluiceError;
use tracing::debug;

/// The path of generation `<n>` for a live file, e.g. `SystemLog.txt_3`.
pub fn generation_path(live: &Path, generation: u32) -> PathBuf {
    let mut name = live.as_os_str().to_os_string();
    name.push(format!("_{generation}"));
    PathBuf::from(name)
}

/// Enumerate the generation numbers present for a live file.
///
/// Only strictly numeric suffixes count. A stray `SystemLog.txt_old` next to
/// the log is left alone rather than renamed or deleted.
pub async fn list_generations(live: &Path) -> Result<Vec<u32>, SluiceError> {
    let dir = match live.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let Some(file_name) = live.file_name() else {
        return Ok(Vec::new());
    };
    let prefix = format!("{}_", file_name.to_string_lossy());

    let mut generations = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(SluiceError::io)?;
    while let Some(entry) = entries.next_entry().await.map_err(SluiceError::io)? {
        let name = entry.file_name();
        if let Some(suffix) = name.to_string_lossy().strip_prefix(&prefix)
            && let Ok(generation) = suffix.parse::<u32>()
        {
            generations.push(generation);
        }
    }
    Ok(generations)
}

/// Roll the live file into the `_1` slot, keeping at most `max_generations`
/// generation files.
///
/// 1. While the generation count is at or above the cap, delete the
///    highest-numbered generation. Stops early once none remain, so a cap of
///    zero clears every generation instead of spinning.
/// 2. If a `_1` generation survives, shift every survivor up one slot,
///    highest first so no rename collides.
/// 3. Move the live file to `_1`. The caller reopens a fresh live file.
pub async fn roll_over(live: &Path, max_generations: u32) -> Result<(), SluiceError> {
    let mut generations = list_generations(live).await?;

    while generations.len() >= max_generations as usize {
        let Some(&highest) = generations.iter().max() else {
            break;
        };
        tokio::fs::remove_file(generation_path(live, highest))
            .await
            .map_err(SluiceError::io)?;
        generations.retain(|&g| g != highest);
    }

    if generations.contains(&1) {
        generations.sort_unstable_by(|a, b| b.cmp(a));
        for &generation in &generations {
            tokio::fs::rename(
                generation_path(live, generation),
                generation_path(live, generation + 1),
            )
            .await
            .map_err(SluiceError::io)?;
        }
    }

    tokio::fs::rename(live, generation_path(live, 1))
        .await
        .map_err(SluiceError::io)?;
    debug!(path = %live.display(), "rolled live log into generation 1");
    Ok(())
}

//! Image pool
//!
//! The pool is whatever regular files sit in the image directory at the time
//! of the request. No index is kept between renders.

use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::index;
use rand::Rng;

use super::FlyerError;

/// Photos placed on every flyer
pub const PHOTO_COUNT: usize = 5;

/// List the pool directory, sorted by file name.
///
/// Subdirectories and dot files are skipped. Symlinks count as the file
/// they point to.
pub fn list_pool(dir: &Path) -> Result<Vec<PathBuf>, FlyerError> {
    let unreadable = |source| FlyerError::PoolUnreadable {
        path: dir.display().to_string(),
        source,
    };

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let path = entry.path();
        if hidden || !path.is_file() {
            continue;
        }
        entries.push(path);
    }
    entries.sort();
    Ok(entries)
}

/// Pick `PHOTO_COUNT` distinct entries in random order
pub fn choose_photos<R: Rng + ?Sized>(
    pool: &[PathBuf],
    rng: &mut R,
) -> Result<Vec<PathBuf>, FlyerError> {
    if pool.len() < PHOTO_COUNT {
        return Err(FlyerError::NotEnoughImages {
            found: pool.len(),
            needed: PHOTO_COUNT,
        });
    }

    Ok(index::sample(rng, pool.len(), PHOTO_COUNT)
        .into_iter()
        .map(|i| pool[i].clone())
        .collect())
}

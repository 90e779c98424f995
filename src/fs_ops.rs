//! Crash-safe file and directory replacement helpers.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use rand::TryRngCore;

/// Write `data` to `path` through a uniquely named sibling temp file and a rename.
///
/// Readers either see the previous contents or the complete new contents.
pub fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| std::io::Error::other("path has no parent directory"))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| std::io::Error::other("path has no file name"))?;

    let mut last_err = None;
    for _ in 0..5 {
        let mut bytes = [0u8; 6];
        rand::rngs::OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|err| std::io::Error::other(format!("temp suffix: {err}")))?;
        let suffix: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        let tmp_path = dir.join(format!("{}.tmp-{suffix}", file_name.to_string_lossy()));

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                last_err = Some(err);
                continue;
            }
            Err(err) => return Err(err),
        };

        let written = file.write_all(data).and_then(|_| file.sync_all());
        drop(file);
        if let Err(err) = written.and_then(|_| fs::rename(&tmp_path, path)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }
        return Ok(());
    }

    Err(last_err.unwrap_or_else(|| std::io::Error::other("failed to create temp file")))
}

/// Swap a fully written `staged` directory into place at `dest`.
///
/// The previous `dest` is moved aside to `dest.old` and only deleted after the
/// new directory is in place; if the final rename fails the old directory is
/// restored. A `dest.old` left by an interrupted swap is put back first, so it
/// is never deleted while `dest` is missing.
pub fn swap_dir(staged: &Path, dest: &Path) -> std::io::Result<()> {
    recover_dir(dest)?;
    let old_path = with_suffix(dest, "old");
    if old_path.exists() {
        fs::remove_dir_all(&old_path)?;
    }
    let had_previous = dest.exists();
    if had_previous {
        fs::rename(dest, &old_path)?;
    }
    if let Err(err) = fs::rename(staged, dest) {
        if had_previous {
            let _ = fs::rename(&old_path, dest);
        }
        return Err(err);
    }
    if had_previous {
        let _ = fs::remove_dir_all(&old_path);
    }
    Ok(())
}

/// Move `dest.old` back to `dest` when a swap stopped between its two renames.
///
/// Returns `true` when a directory was restored.
pub fn recover_dir(dest: &Path) -> std::io::Result<bool> {
    let old_path = with_suffix(dest, "old");
    if dest.exists() || !old_path.is_dir() {
        return Ok(false);
    }
    fs::rename(&old_path, dest)?;
    Ok(true)
}

/// Remove a `dest.new` staging directory left by a save that never finished.
///
/// Returns `true` when one was found.
pub fn discard_staging(dest: &Path) -> std::io::Result<bool> {
    let new_path = with_suffix(dest, "new");
    if !new_path.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(&new_path)?;
    Ok(true)
}

/// Prepare an empty staging directory next to `dest` (`dest.new`).
pub fn staging_dir_for(dest: &Path) -> std::io::Result<PathBuf> {
    discard_staging(dest)?;
    let new_path = with_suffix(dest, "new");
    fs::create_dir_all(&new_path)?;
    Ok(new_path)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("file")
        .to_string();
    name.push('.');
    name.push_str(suffix);
    path.with_file_name(name)
}

use crate::error::Result;
use std::fs::{self, File};
use std::path::Path;

/// Write `contents` to `path` atomically: write to a sibling `.tmp` file and
/// rename into place. The rename is atomic on the same filesystem, so a
/// crash mid-write never leaves a half-written pack at `path`.
pub fn atomic_write(path: &Path, write_fn: impl FnOnce(&mut File) -> Result<()>) -> Result<()> {
    let tmp_path = sibling_tmp_path(path);
    let mut f = File::create(&tmp_path)?;
    let result = write_fn(&mut f);
    match result {
        Ok(()) => {
            f.sync_all()?;
            drop(f);
            fs::rename(&tmp_path, path)?;
            Ok(())
        }
        Err(e) => {
            drop(f);
            let _ = fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}

fn sibling_tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    match path.parent() {
        Some(parent) => parent.join(name),
        None => std::path::PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn atomic_write_produces_final_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.bin");
        atomic_write(&path, |f| {
            f.write_all(b"hello")?;
            Ok(())
        })
        .unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello");
        assert!(!sibling_tmp_path(&path).exists());
    }

    #[test]
    fn atomic_write_cleans_up_tmp_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.bin");
        let err = atomic_write(&path, |_f| {
            Err(crate::error::MemPackError::validation("boom"))
        });
        assert!(err.is_err());
        assert!(!path.exists());
        assert!(!sibling_tmp_path(&path).exists());
    }
}

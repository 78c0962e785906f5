//! File vault: identifier-keyed blob storage on disk.
//!
//! Uploaded and generated files share two flat directories; every on-disk
//! name embeds a uuid, so concurrent writes never collide. Removal is
//! delete-then-verify: a failed deletion is reported to the caller instead
//! of being swallowed, so orphaned bytes are a detectable, retryable
//! condition rather than silent disk garbage.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct FileVault {
    upload_dir: PathBuf,
    generated_dir: PathBuf,
}

impl FileVault {
    pub fn new(upload_dir: PathBuf, generated_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&upload_dir)
            .with_context(|| format!("Failed to create {}", upload_dir.display()))?;
        std::fs::create_dir_all(&generated_dir)
            .with_context(|| format!("Failed to create {}", generated_dir.display()))?;
        Ok(Self {
            upload_dir,
            generated_dir,
        })
    }

    /// Store uploaded bytes under `<id>_<original name>`.
    pub fn store_upload(&self, id: Uuid, original_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.upload_dir.join(format!("{}_{}", id, sanitize_name(original_name)));
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write upload {}", path.display()))?;
        Ok(path)
    }

    /// Store generated bytes under `generated_<id>.<ext>`.
    pub fn store_generated(&self, id: Uuid, extension: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.generated_dir.join(format!("generated_{}.{}", id, extension));
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write generated file {}", path.display()))?;
        Ok(path)
    }

    /// Remove backing bytes and verify they are gone. `Ok(())` means the
    /// path no longer exists (including "was already gone").
    pub fn remove(&self, path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove {}", path.display()));
            }
        }
        if path.exists() {
            anyhow::bail!("{} still exists after removal", path.display());
        }
        Ok(())
    }
}

/// Keep on-disk names to one path segment; the uuid prefix guarantees
/// uniqueness either way.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> (tempfile::TempDir, FileVault) {
        let dir = tempfile::tempdir().unwrap();
        let vault = FileVault::new(dir.path().join("uploads"), dir.path().join("generated")).unwrap();
        (dir, vault)
    }

    #[test]
    fn upload_and_generated_paths_are_id_keyed() {
        let (_dir, vault) = vault();
        let id = Uuid::new_v4();

        let upload = vault.store_upload(id, "report.xlsx", b"bytes").unwrap();
        assert!(upload.file_name().unwrap().to_string_lossy().contains(&id.to_string()));

        let generated = vault.store_generated(id, "pptx", b"bytes").unwrap();
        assert_eq!(
            generated.file_name().unwrap().to_string_lossy(),
            format!("generated_{}.pptx", id)
        );
    }

    #[test]
    fn remove_verifies_deletion_and_tolerates_missing() {
        let (_dir, vault) = vault();
        let path = vault.store_upload(Uuid::new_v4(), "a.txt", b"x").unwrap();

        vault.remove(&path).unwrap();
        assert!(!path.exists());
        // Idempotent: already-gone is success.
        vault.remove(&path).unwrap();
    }

    #[test]
    fn traversal_characters_are_neutralized() {
        let (dir, vault) = vault();
        let path = vault.store_upload(Uuid::new_v4(), "../../etc/passwd", b"x").unwrap();
        assert!(path.starts_with(dir.path().join("uploads")));
    }
}

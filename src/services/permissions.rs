use crate::core::photo::PermissionStatus;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

pub trait PermissionGate: Send + Sync {
    fn status(&self) -> PermissionStatus;

    /// Never returns `Undetermined`.
    fn request(&self) -> PermissionStatus;
}

/// Grants access to a library directory that can be both listed and written.
pub struct DirectoryPermissions {
    root: PathBuf,
    requested: AtomicBool,
}

impl DirectoryPermissions {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            requested: AtomicBool::new(false),
        }
    }

    fn check(&self) -> PermissionStatus {
        if let Err(e) = fs::read_dir(&self.root) {
            log::warn!("Cannot list {}: {}", self.root.display(), e);
            return PermissionStatus::Denied;
        }
        match fs::metadata(&self.root) {
            Ok(metadata) if !metadata.permissions().readonly() => PermissionStatus::Granted,
            Ok(_) => {
                log::warn!("{} is read-only", self.root.display());
                PermissionStatus::Denied
            }
            Err(e) => {
                log::warn!("Error checking permissions for {}: {}", self.root.display(), e);
                PermissionStatus::Denied
            }
        }
    }
}

impl PermissionGate for DirectoryPermissions {
    fn status(&self) -> PermissionStatus {
        if !self.requested.load(Ordering::SeqCst) {
            return PermissionStatus::Undetermined;
        }
        self.check()
    }

    fn request(&self) -> PermissionStatus {
        self.requested.store(true, Ordering::SeqCst);
        self.check()
    }
}

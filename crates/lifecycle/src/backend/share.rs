//! Distribution points: where installers and scripts are served from.
//!
//! A distribution point exposes `Packages/` and `Scripts/` directories once
//! mounted. [`MountedShare`] holds the mount for the length of a run and
//! unmounts when dropped, so every exit path releases it.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A mountable package repository.
pub trait DistributionPoint: Send + Sync {
    /// Make the share available and return its local root.
    fn mount(&self) -> Result<PathBuf>;

    /// Release the share. Must be safe to call after a failed mount.
    fn unmount(&self) -> Result<()>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// A directory that is already local (or mounted by someone else).
#[derive(Debug, Clone)]
pub struct LocalShare {
    root: PathBuf,
}

impl LocalShare {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DistributionPoint for LocalShare {
    fn mount(&self) -> Result<PathBuf> {
        if !self.root.is_dir() {
            return Err(Error::transient(
                "distribution point",
                format!("{} is not a directory", self.root.display()),
            ));
        }
        Ok(self.root.clone())
    }

    fn unmount(&self) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// An SMB share mounted with `mount_smbfs`.
#[derive(Debug, Clone)]
pub struct SmbShare {
    url: String,
    mount_point: PathBuf,
}

impl SmbShare {
    /// `url` is `//user@server/share`.
    pub fn new(url: impl Into<String>, mount_point: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            mount_point: mount_point.into(),
        }
    }

    fn is_mounted(&self) -> bool {
        Command::new("/sbin/mount")
            .output()
            .map(|o| {
                let needle = format!(" on {} ", self.mount_point.display());
                String::from_utf8_lossy(&o.stdout).contains(&needle)
            })
            .unwrap_or(false)
    }
}

impl DistributionPoint for SmbShare {
    fn mount(&self) -> Result<PathBuf> {
        if self.is_mounted() {
            log::debug!("{} already mounted", self.mount_point.display());
            return Ok(self.mount_point.clone());
        }

        fs::create_dir_all(&self.mount_point).map_err(|e| Error::io(&self.mount_point, e))?;
        let output = Command::new("/sbin/mount_smbfs")
            .args(["-N", &self.url])
            .arg(&self.mount_point)
            .output()
            .map_err(|e| Error::transient("distribution point", e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::transient(
                "distribution point",
                format!("mount_smbfs {} failed: {}", self.url, stderr.trim()),
            ));
        }
        Ok(self.mount_point.clone())
    }

    fn unmount(&self) -> Result<()> {
        if !self.is_mounted() {
            return Ok(());
        }
        let status = Command::new("/sbin/umount")
            .arg(&self.mount_point)
            .status()
            .map_err(|e| Error::io(&self.mount_point, e))?;
        if !status.success() {
            return Err(Error::Other(format!(
                "umount {} exited with {status}",
                self.mount_point.display()
            )));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} at {}", self.url, self.mount_point.display())
    }
}

/// A mounted distribution point, unmounted on drop.
pub struct MountedShare {
    point: Box<dyn DistributionPoint>,
    root: PathBuf,
}

impl MountedShare {
    pub fn mount(point: Box<dyn DistributionPoint>) -> Result<Self> {
        log::info!("Mounting distribution point {}", point.describe());
        let root = point.mount()?;
        Ok(Self { point, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root.join("Packages")
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("Scripts")
    }
}

impl Drop for MountedShare {
    fn drop(&mut self) {
        log::debug!("Unmounting distribution point {}", self.point.describe());
        if let Err(e) = self.point.unmount() {
            log::warn!("Failed to unmount {}: {e}", self.point.describe());
        }
    }
}

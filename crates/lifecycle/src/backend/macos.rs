//! macOS installer and script runner.
//!
//! Payloads are flat `.pkg` files installed with `installer(8)`. Removal walks
//! the package's installer receipts with `pkgutil(1)`, deletes their files and
//! forgets the receipts.

use crate::backend::{PayloadInstaller, ScriptContext, ScriptRunner};
use crate::error::{Error, Result};
use crate::types::Package;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Runs `/usr/sbin/installer` and `/usr/sbin/pkgutil`.
#[derive(Debug, Clone)]
pub struct PkgInstaller {
    installer: PathBuf,
    pkgutil: PathBuf,
}

impl Default for PkgInstaller {
    fn default() -> Self {
        Self {
            installer: PathBuf::from("/usr/sbin/installer"),
            pkgutil: PathBuf::from("/usr/sbin/pkgutil"),
        }
    }
}

impl PkgInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    fn run(&self, basename: &str, program: &Path, args: &[&str]) -> Result<Output> {
        log::debug!("Running {} {}", program.display(), args.join(" "));
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| Error::payload(basename, format!("failed to execute {}: {e}", program.display())))?;
        Ok(output)
    }

    fn run_checked(&self, basename: &str, program: &Path, args: &[&str]) -> Result<String> {
        let output = self.run(basename, program, args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::payload(
                basename,
                format!(
                    "{} exited with {}: {}",
                    program.display(),
                    output.status,
                    stderr.trim()
                ),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Files and directories recorded under one installer receipt, relative
    /// to the volume.
    fn receipt_files(&self, basename: &str, receipt_id: &str, target: &Path) -> Result<Vec<PathBuf>> {
        let volume = target.to_string_lossy();
        let listing = self.run_checked(
            basename,
            &self.pkgutil,
            &["--only-files", "--files", receipt_id, "--volume", &volume],
        )?;
        Ok(listing
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| target.join(l))
            .collect())
    }
}

impl PayloadInstaller for PkgInstaller {
    fn install(&self, package: &Package, source: &Path, target: &Path) -> Result<()> {
        if !source.exists() {
            return Err(Error::payload(
                &package.basename,
                format!("installer not found at {}", source.display()),
            ));
        }
        let source = source.to_string_lossy();
        let target = target.to_string_lossy();
        self.run_checked(
            &package.basename,
            &self.installer,
            &["-pkg", &source, "-target", &target],
        )?;
        Ok(())
    }

    fn remove(&self, package: &Package, target: &Path) -> Result<()> {
        if package.receipt_ids.is_empty() {
            return Err(Error::payload(
                &package.basename,
                "no installer receipts to remove",
            ));
        }

        for receipt_id in &package.receipt_ids {
            let files = self.receipt_files(&package.basename, receipt_id, target)?;
            log::debug!("{receipt_id}: removing {} files", files.len());
            for file in files {
                match fs::remove_file(&file) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => log::warn!("Could not remove {}: {e}", file.display()),
                }
            }
            let volume = target.to_string_lossy();
            self.run_checked(
                &package.basename,
                &self.pkgutil,
                &["--forget", receipt_id, "--volume", &volume],
            )?;
        }
        Ok(())
    }
}

/// Runs package scripts from a directory on the distribution point.
///
/// Scripts are invoked as `/bin/sh <script> <target_drive> <computer_name> <user>`.
#[derive(Debug, Clone)]
pub struct ShellScripts {
    root: PathBuf,
}

impl ShellScripts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ScriptRunner for ShellScripts {
    fn run(&self, script: &str, ctx: &ScriptContext) -> Result<i32> {
        let path = self.root.join(script);
        if !path.is_file() {
            return Err(Error::NotFound(format!("script {}", path.display())));
        }

        log::debug!("Running script {}", path.display());
        let output = Command::new("/bin/sh")
            .arg(&path)
            .arg(&ctx.target_drive)
            .arg(&ctx.computer_name)
            .arg(&ctx.user)
            .output()
            .map_err(|e| Error::io(&path, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            log::debug!("[{script}] {line}");
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            log::warn!("[{script}] {line}");
        }

        // Killed by a signal counts as failure
        Ok(output.status.code().unwrap_or(-1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::pkg;
    use crate::types::PackageStatus;
    use tempfile::TempDir;

    fn context() -> ScriptContext {
        ScriptContext {
            target_drive: PathBuf::from("/"),
            computer_name: "lab-01".to_string(),
            user: "alice".to_string(),
        }
    }

    #[test]
    fn test_script_exit_code() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ok.sh"), "exit 0\n").unwrap();
        fs::write(dir.path().join("veto.sh"), "exit 3\n").unwrap();

        let scripts = ShellScripts::new(dir.path());
        assert_eq!(scripts.run("ok.sh", &context()).unwrap(), 0);
        assert_eq!(scripts.run("veto.sh", &context()).unwrap(), 3);
    }

    #[test]
    fn test_script_receives_context_arguments() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("args.txt");
        fs::write(
            dir.path().join("args.sh"),
            format!("echo \"$1 $2 $3\" > {}\n", out.display()),
        )
        .unwrap();

        ShellScripts::new(dir.path()).run("args.sh", &context()).unwrap();
        assert_eq!(fs::read_to_string(out).unwrap().trim(), "/ lab-01 alice");
    }

    #[test]
    fn test_missing_script_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = ShellScripts::new(dir.path())
            .run("absent.sh", &context())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_install_missing_source_is_payload_failure() {
        let dir = TempDir::new().unwrap();
        let package = pkg("app", 1, 0, PackageStatus::Live);
        let err = PkgInstaller::new()
            .install(&package, &dir.path().join("app.pkg"), Path::new("/"))
            .unwrap_err();
        assert!(matches!(err, Error::PayloadFailure { .. }));
    }

    #[test]
    fn test_remove_without_receipts_is_payload_failure() {
        let package = pkg("app", 1, 0, PackageStatus::Live);
        let err = PkgInstaller::new().remove(&package, Path::new("/")).unwrap_err();
        assert!(matches!(err, Error::PayloadFailure { .. }));
    }
}

//! Core data model: packages, editions, receipts and logout-queue entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Identifier of a management-platform group.
pub type GroupId = String;

/// A specific `(version, revision)` build of a basename.
///
/// Field order matters: the derived ordering compares `version` first and
/// `revision` second, which is the edition order used for auto-update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edition {
    pub version: u32,
    pub revision: u32,
}

impl Edition {
    pub fn new(version: u32, revision: u32) -> Self {
        Self { version, revision }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.version, self.revision)
    }
}

impl FromStr for Edition {
    type Err = String;

    /// Parse `"2.1"` (version 2, revision 1). A bare `"2"` means revision 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (version, revision) = match s.split_once('.') {
            Some((v, r)) => (v, r),
            None => (s, "0"),
        };
        let version = version
            .parse()
            .map_err(|_| format!("Invalid edition version: '{version}'"))?;
        let revision = revision
            .parse()
            .map_err(|_| format!("Invalid edition revision: '{revision}'"))?;
        Ok(Self { version, revision })
    }
}

/// Server-side status of an edition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    Pilot,
    Live,
    Deprecated,
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pilot => write!(f, "pilot"),
            Self::Live => write!(f, "live"),
            Self::Deprecated => write!(f, "deprecated"),
        }
    }
}

/// How an installed edition got onto the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallType {
    Pilot,
    Live,
}

impl InstallType {
    /// Install type recorded for an edition with the given catalog status.
    pub fn for_status(status: PackageStatus) -> Self {
        match status {
            PackageStatus::Live => Self::Live,
            PackageStatus::Pilot | PackageStatus::Deprecated => Self::Pilot,
        }
    }
}

impl fmt::Display for InstallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pilot => write!(f, "pilot"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// Script references attached to a package, resolved against the
/// distribution point's script directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scripts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preinstall: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postinstall: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preuninstall: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postuninstall: Option<String>,
}

/// One edition of a package as published in the server catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Product family shared by all editions
    pub basename: String,

    #[serde(flatten)]
    pub edition: Edition,

    pub status: PackageStatus,

    /// Installer file name on the distribution point
    pub file_name: String,

    #[serde(default)]
    pub needs_reboot: bool,

    #[serde(default)]
    pub uninstallable: bool,

    #[serde(default)]
    pub auto_install_groups: BTreeSet<GroupId>,

    #[serde(default)]
    pub excluded_groups: BTreeSet<GroupId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_days: Option<u32>,

    /// Path whose foreground usage is tracked for expiration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_path: Option<String>,

    /// Installer receipt identifiers forgotten on uninstall
    #[serde(default)]
    pub receipt_ids: Vec<String>,

    #[serde(default)]
    pub scripts: Scripts,
}

impl Package {
    /// `basename@version.revision`
    pub fn label(&self) -> String {
        format!("{}@{}", self.basename, self.edition)
    }

    pub fn is_live(&self) -> bool {
        self.status == PackageStatus::Live
    }
}

/// Local record of an installed basename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub basename: String,
    #[serde(flatten)]
    pub edition: Edition,
    pub install_type: InstallType,
    pub installed_at: DateTime<Utc>,
}

impl Receipt {
    pub fn label(&self) -> String {
        format!("{}@{}", self.basename, self.edition)
    }
}

/// Whether a deferred entry installs or removes its edition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueAction {
    Install,
    Uninstall,
}

impl fmt::Display for QueueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Uninstall => write!(f, "uninstall"),
        }
    }
}

/// An action deferred to logout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutQueueEntry {
    pub basename: String,
    #[serde(flatten)]
    pub edition: Edition,
    pub action: QueueAction,
    pub enqueued_at: DateTime<Utc>,
}

impl LogoutQueueEntry {
    pub fn new(basename: impl Into<String>, edition: Edition, action: QueueAction) -> Self {
        Self {
            basename: basename.into(),
            edition,
            action,
            enqueued_at: Utc::now(),
        }
    }

    /// Same basename, edition and action (enqueue time ignored).
    pub fn same_request(&self, other: &Self) -> bool {
        self.basename == other.basename && self.edition == other.edition && self.action == other.action
    }

    pub fn label(&self) -> String {
        format!("{} {}@{}", self.action, self.basename, self.edition)
    }
}

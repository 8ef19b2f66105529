//! Typed payloads of the appliance status API.

use serde::{Deserialize, Serialize};

/// System information payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysInfo {
    /// Installed licenses and pattern databases.
    #[serde(default)]
    pub licenses: Vec<LicenseEntry>,
}

/// A single license or pattern-database entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseEntry {
    /// Vendor the entry belongs to.
    pub vendor: String,
    /// Whether the entry is currently valid.
    pub valid: bool,
    /// Days until the entry expires.
    #[serde(default)]
    pub days_remaining: i64,
}

/// Version payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Currently booted build number.
    pub build: i64,
}

/// Image download status payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageStatus {
    /// Whether a download is in progress.
    #[serde(rename = "currentlyDownloading")]
    pub currently_downloading: bool,
    /// Last status message reported by the appliance.
    #[serde(rename = "downloadStatusMessage", default)]
    pub download_status_message: String,
}

/// A system image installed on the appliance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemImage {
    /// Build number of the image.
    #[serde(rename = "releaseId")]
    pub release_id: i64,
    /// Whether this image boots by default.
    #[serde(rename = "defaultImage")]
    pub default_image: bool,
}

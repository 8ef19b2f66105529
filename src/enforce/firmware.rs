//! Firmware build enforcement.
//!
//! Not a drift reconciliation but a strict upgrade: the requested build must
//! be greater than the running one unless explicitly forced. The fetch is
//! triggered through the status API, polled on a fixed bound, and confirmed
//! against the default image's build number.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{EnforceError, ModGuardError, Result};
use crate::rest::{ImageStatus, StatusApi};

use super::outcome::{Changes, EnforceOutcome};

/// Seconds between download-status polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Maximum number of download-status polls.
const DEFAULT_MAX_POLLS: u32 = 9;

/// Enforcer that upgrades the appliance firmware to a target build.
pub struct FirmwareEnforcer<'a> {
    /// Out-of-band status API.
    status: &'a dyn StatusApi,
    /// Pause between download-status polls.
    poll_interval: Duration,
    /// Maximum number of download-status polls.
    max_polls: u32,
}

impl<'a> FirmwareEnforcer<'a> {
    /// Creates a new firmware enforcer.
    #[must_use]
    pub const fn new(status: &'a dyn StatusApi) -> Self {
        Self {
            status,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    /// Overrides the pause between download-status polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Ensures the appliance runs the target build.
    ///
    /// Refuses when the running build is already at or past the target,
    /// unless `force` is set; a refusal makes no further device calls.
    ///
    /// # Errors
    ///
    /// Never returns an error; all failures fold into the outcome.
    pub async fn ensure_build(
        &self,
        image_url: &str,
        build_num: i64,
        force: bool,
    ) -> Result<EnforceOutcome> {
        info!("Firmware upgrade requested: build {build_num} from {image_url}");

        if let Err(e) = self.status.login().await {
            return Ok(EnforceOutcome::failure(format!(
                "execution failed authenticating against the status API: '{e}'"
            )));
        }

        let version = match self.status.version().await {
            Ok(version) => version,
            Err(e) => {
                return Ok(EnforceOutcome::failure(format!(
                    "execution failed retrieving system version: '{e}'"
                )))
            }
        };

        let current = version.build;
        if current >= build_num && !force {
            let precondition = EnforceError::UpgradePrecondition {
                current,
                requested: build_num,
            };
            warn!("{precondition}");
            return Ok(EnforceOutcome::failure(precondition.to_string()));
        }

        if let Err(e) = self.status.retrieve_image(image_url).await {
            return Ok(EnforceOutcome::failure(format!(
                "execution failed triggering the image fetch: '{e}'"
            )));
        }

        let final_status = match self.poll_download().await {
            Ok(status) => status,
            Err(e) => return Ok(EnforceOutcome::failure(e.to_string())),
        };
        debug!("Image fetch finished: {}", final_status.download_status_message);

        let images = match self.status.system_images().await {
            Ok(images) => images,
            Err(e) => {
                return Ok(EnforceOutcome::failure(format!(
                    "execution failed retrieving the system image list: '{e}'"
                )))
            }
        };

        let Some(default_image) = images.iter().find(|image| image.default_image) else {
            return Ok(EnforceOutcome::failure(
                "No default image reported after the fetch",
            ));
        };

        if default_image.release_id == build_num {
            Ok(
                EnforceOutcome::success(default_image.release_id.to_string()).with_changes(
                    Changes::single(
                        "build",
                        Some(&current.to_string()),
                        &build_num.to_string(),
                    ),
                ),
            )
        } else {
            Ok(EnforceOutcome::failure(format!(
                "[{}] The default image is still {}",
                final_status.download_status_message, default_image.release_id
            )))
        }
    }

    /// Polls the download status until it settles or the bound is exhausted.
    async fn poll_download(&self) -> Result<ImageStatus> {
        let mut last_status = None;

        for poll in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let status = self.status.retrieve_image_status().await.map_err(|e| {
                ModGuardError::internal(format!(
                    "execution failed polling the image fetch: '{e}'"
                ))
            })?;

            if !status.currently_downloading {
                return Ok(status);
            }

            debug!(
                "Image still downloading (poll {poll}/{}): {}",
                self.max_polls, status.download_status_message
            );
            last_status = Some(status);
        }

        Err(ModGuardError::Enforce(EnforceError::UpgradeTimeout {
            last_status: last_status
                .map(|s| s.download_status_message)
                .unwrap_or_default(),
        }))
    }
}

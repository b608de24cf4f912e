use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::driver::{DriverCallbacks, ProgressDriver, ProgressMode, ProgressOptions};
use crate::host::Host;
use crate::profile::{Profile, Settings};
use crate::progress::Phase;
use crate::releases::{Platform, ReleaseInfo};

/// A finished download smaller than this is a release whose assets are still
/// being built upstream, not a playable game.
pub const MIN_ARCHIVE_BYTES: u64 = 10 * 1024 * 1024;

fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        done as f64 / total as f64 * 100.0
    }
}

struct PendingInstall {
    profile_id: String,
    profile_name: String,
}

/// Download-then-extract flow behind the install control on a release row.
///
/// The host performs the actual transfer and extraction and feeds events in;
/// this type owns the progress driver, the profile bookkeeping, and the
/// failure path. Any failure removes the profile created for the install and
/// routes the message through `on_error`; the progress phase is left for the
/// caller to `reset()` once the message has been shown.
pub struct GameInstall {
    settings: Arc<Mutex<Settings>>,
    driver: ProgressDriver,
    platform: Platform,
    pending: Option<PendingInstall>,
}

impl GameInstall {
    pub fn new(settings: Arc<Mutex<Settings>>, callbacks: DriverCallbacks) -> Self {
        Self::for_platform(settings, callbacks, Platform::current())
    }

    pub fn for_platform(
        settings: Arc<Mutex<Settings>>,
        callbacks: DriverCallbacks,
        platform: Platform,
    ) -> Self {
        // True progress comes from the host transfer, so the driver runs in
        // manual mode.
        let options = ProgressOptions {
            mode: ProgressMode::Manual,
            ..ProgressOptions::default()
        };
        Self {
            settings,
            driver: ProgressDriver::new(options, callbacks),
            platform,
            pending: None,
        }
    }

    pub fn driver(&self) -> &ProgressDriver {
        &self.driver
    }

    /// Start installing `release`: create a profile named after its tag and
    /// arm the progress control.
    pub fn begin(&mut self, release: &ReleaseInfo, host: &dyn Host) -> Result<(), String> {
        if self.pending.is_some() {
            return Err("an install is already in progress".to_string());
        }
        let tag = release.tag_name.clone();
        log::info!("installing release {}", tag);
        self.settings
            .lock()
            .unwrap()
            .add_profile(Profile::new(tag.clone(), tag.clone(), None), host)?;
        self.pending = Some(PendingInstall {
            profile_id: tag.clone(),
            profile_name: tag,
        });
        self.driver.activate();
        Ok(())
    }

    pub fn download_progress(&self, downloaded: u64, total: u64) {
        self.driver.report(percent(downloaded, total));
    }

    /// The transfer is done. Rejects archives under [`MIN_ARCHIVE_BYTES`];
    /// otherwise the download stage settles and extraction may begin.
    pub fn download_finished(&mut self, total_bytes: u64, host: &dyn Host) -> Result<(), String> {
        if total_bytes < MIN_ARCHIVE_BYTES {
            let message = format!(
                "downloaded archive is only {} bytes; the release is still being built upstream",
                total_bytes
            );
            self.abort(&message, host);
            return Err(message);
        }
        self.driver.report(100.0);
        self.driver.finish_phase();
        Ok(())
    }

    /// Extraction samples arriving while the download stage is still settling
    /// are dropped: each context field may only be written while its own
    /// phase is active, and the download bar must stay at 100 until then.
    pub fn extract_progress(&self, done: u64, total: u64) {
        if self.driver.phase() == Phase::InExtractProgress {
            self.driver.report(percent(done, total));
        }
    }

    /// Extraction landed under `game_root`. Records the platform executable
    /// on the install's profile and settles the final stage.
    pub fn extract_finished(
        &mut self,
        game_root: PathBuf,
        host: &dyn Host,
    ) -> Result<(), String> {
        let Some(pending) = self.pending.take() else {
            return Err("no install in progress".to_string());
        };
        let executable = match self.platform {
            Platform::Windows => game_root.join("cataclysm-tiles.exe"),
            Platform::MacOs => game_root.join("Cataclysm.app"),
        };
        let edited = self.settings.lock().unwrap().edit_profile(
            &pending.profile_id,
            &pending.profile_name,
            Some(executable),
        );
        if let Err(e) = edited {
            self.pending = Some(pending);
            self.abort(&e, host);
            return Err(e);
        }
        if self.driver.phase() == Phase::InExtractProgress {
            self.driver.report(100.0);
        }
        self.driver.finish_phase();
        Ok(())
    }

    /// Tear the install down: the profile created in `begin` is removed and
    /// the message goes out through `on_error`.
    pub fn abort(&mut self, message: &str, host: &dyn Host) {
        log::warn!("install aborted: {}", message);
        if let Some(pending) = self.pending.take() {
            if let Err(e) = self
                .settings
                .lock()
                .unwrap()
                .remove_profile(&pending.profile_id, host)
            {
                log::warn!("failed to remove profile {}: {}", pending.profile_id, e);
            }
        }
        self.driver.fail(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::RecordingHost;
    use crate::progress::Phase;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const MIB: u64 = 1024 * 1024;

    fn release(tag: &str) -> ReleaseInfo {
        ReleaseInfo {
            tag_name: tag.to_string(),
            browser_url: format!("https://example.test/releases/{}", tag),
            download_url: format!("https://example.test/download/{}", tag),
        }
    }

    struct Fixture {
        install: GameInstall,
        settings: Arc<Mutex<Settings>>,
        completions: Arc<AtomicUsize>,
        errors: Arc<Mutex<Vec<String>>>,
    }

    fn fixture() -> Fixture {
        let settings = Arc::new(Mutex::new(Settings::default()));
        let completions = Arc::new(AtomicUsize::new(0));
        let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let done = Arc::clone(&completions);
        let sink = Arc::clone(&errors);
        let callbacks = DriverCallbacks {
            on_click: None,
            on_complete: Some(Box::new(move || {
                done.fetch_add(1, Ordering::SeqCst);
            })),
            on_error: Some(Box::new(move |msg| {
                sink.lock().unwrap().push(msg.to_string());
            })),
        };
        Fixture {
            install: GameInstall::for_platform(
                Arc::clone(&settings),
                callbacks,
                Platform::Windows,
            ),
            settings,
            completions,
            errors,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_install_creates_profile_and_records_the_executable() {
        let mut f = fixture();
        let host = RecordingHost::new();

        f.install.begin(&release("0.H"), &host).unwrap();
        assert_eq!(f.settings.lock().unwrap().get_active_profile().id, "0.H");
        assert_eq!(f.install.driver().phase(), Phase::InDownloadProgress);

        f.install.download_progress(5 * MIB, 10 * MIB);
        assert_eq!(
            f.install
                .driver()
                .machine()
                .lock()
                .unwrap()
                .context()
                .download_progress,
            50.0
        );

        f.install.download_finished(20 * MIB, &host).unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(f.install.driver().phase(), Phase::InExtractProgress);

        f.install.extract_progress(3, 4);
        f.install
            .extract_finished(PathBuf::from("/games/cdda-0.H"), &host)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(f.install.driver().phase(), Phase::Success);
        assert_eq!(f.completions.load(Ordering::SeqCst), 1);
        let profile = f.settings.lock().unwrap().get_active_profile();
        assert_eq!(
            profile.game_path,
            Some(PathBuf::from("/games/cdda-0.H/cataclysm-tiles.exe"))
        );
        assert!(f.errors.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn undersized_archive_rolls_the_profile_back() {
        let mut f = fixture();
        let host = RecordingHost::new();

        f.install.begin(&release("0.H"), &host).unwrap();
        f.install.download_progress(5 * MIB, 5 * MIB);
        let err = f.install.download_finished(5 * MIB, &host).unwrap_err();
        assert!(err.contains("still being built"));

        // Profile is gone, error went out, phase is left for the caller.
        let settings = f.settings.lock().unwrap();
        assert!(settings.profiles.iter().all(|p| p.id != "0.H"));
        assert_eq!(settings.get_active_profile().id, "default");
        drop(settings);
        assert_eq!(f.errors.lock().unwrap().len(), 1);
        assert_eq!(f.install.driver().phase(), Phase::InDownloadProgress);

        // A later attempt can start over after a reset.
        f.install.driver().reset();
        f.install.begin(&release("0.G"), &host).unwrap();
        assert_eq!(f.install.driver().phase(), Phase::InDownloadProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn extract_events_in_the_settle_window_leave_the_download_bar_alone() {
        let mut f = fixture();
        let host = RecordingHost::new();

        f.install.begin(&release("0.H"), &host).unwrap();
        f.install.download_progress(10 * MIB, 10 * MIB);
        f.install.download_finished(20 * MIB, &host).unwrap();

        // Extraction already reporting while the download stage settles.
        tokio::time::sleep(Duration::from_millis(100)).await;
        f.install.extract_progress(1, 20);
        assert_eq!(f.install.driver().phase(), Phase::InDownloadProgress);
        let ctx = f.install.driver().machine().lock().unwrap().context();
        assert_eq!(ctx.download_progress, 100.0);
        assert_eq!(ctx.extract_progress, 0.0);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(f.install.driver().phase(), Phase::InExtractProgress);
        f.install.extract_progress(1, 20);
        let ctx = f.install.driver().machine().lock().unwrap().context();
        assert_eq!(ctx.download_progress, 100.0);
        assert_eq!(ctx.extract_progress, 5.0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_installs_are_rejected() {
        let mut f = fixture();
        let host = RecordingHost::new();
        f.install.begin(&release("0.H"), &host).unwrap();
        let err = f.install.begin(&release("0.G"), &host).unwrap_err();
        assert!(err.contains("already in progress"));
    }

    #[tokio::test(start_paused = true)]
    async fn macos_installs_record_the_app_bundle() {
        let settings = Arc::new(Mutex::new(Settings::default()));
        let mut install = GameInstall::for_platform(
            Arc::clone(&settings),
            DriverCallbacks::default(),
            Platform::MacOs,
        );
        let host = RecordingHost::new();

        install.begin(&release("0.H"), &host).unwrap();
        install.download_finished(20 * MIB, &host).unwrap();
        install
            .extract_finished(PathBuf::from("/Applications/cdda"), &host)
            .unwrap();

        let profile = settings.lock().unwrap().get_active_profile();
        assert_eq!(
            profile.game_path,
            Some(PathBuf::from("/Applications/cdda/Cataclysm.app"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn abort_mid_extract_cleans_up() {
        let mut f = fixture();
        let host = RecordingHost::new();

        f.install.begin(&release("0.H"), &host).unwrap();
        f.install.download_finished(20 * MIB, &host).unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        f.install.extract_progress(1, 10);

        f.install.abort("disk full while extracting", &host);
        assert!(f
            .settings
            .lock()
            .unwrap()
            .profiles
            .iter()
            .all(|p| p.id != "0.H"));
        assert_eq!(
            f.errors.lock().unwrap().as_slice(),
            ["disk full while extracting"]
        );
    }
}

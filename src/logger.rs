use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;
use log4rs::{
    append::rolling_file::{
        policy::compound::{
            roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
        },
        RollingFileAppender,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

/// Global registration flag, owned here rather than inferred from the log
/// crate's state. Checked and set in one step so concurrent init calls cannot
/// both win.
static INITIALIZED: AtomicBool = AtomicBool::new(false);

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::SeqCst)
}

#[cfg(test)]
pub(crate) fn reset_registration() {
    INITIALIZED.store(false, Ordering::SeqCst);
}

/// Initialize rolling-file logging under the default app data directory.
pub fn init() -> Result<(), String> {
    init_at(&crate::profile::app_data_dir().join("logs"))
}

/// Initialize logging with the log file under `logs_dir`.
///
/// Calling again after a successful registration is a no-op, not an error:
/// embedders may run setup more than once (hot reload, repeated setup hooks).
/// A failed attempt releases the guard so a later call can retry.
pub fn init_at(logs_dir: &Path) -> Result<(), String> {
    if INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        log::debug!("logger already initialized, skipping");
        return Ok(());
    }
    match register(logs_dir) {
        Ok(()) => Ok(()),
        Err(e) => {
            INITIALIZED.store(false, Ordering::SeqCst);
            Err(e)
        }
    }
}

fn register(logs_dir: &Path) -> Result<(), String> {
    let log_file = logs_dir.join("cata-launcher.log");
    std::fs::create_dir_all(logs_dir).map_err(|e| e.to_string())?;

    // 10MB per file, keep 5 rolled files.
    let roller = FixedWindowRoller::builder()
        .build(
            &logs_dir
                .join("cata-launcher.{}.log")
                .to_string_lossy()
                .to_string(),
            5,
        )
        .map_err(|e| e.to_string())?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(10 * 1024 * 1024)), Box::new(roller));

    let file_appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} {M} - {m}{n}",
        )))
        .build(&log_file, Box::new(policy))
        .map_err(|e| e.to_string())?;

    let cfg_builder = {
        let cfg_builder =
            Config::builder().appender(Appender::builder().build("file", Box::new(file_appender)));

        // In dev builds, also log to console for convenience.
        #[cfg(debug_assertions)]
        let cfg_builder = {
            use log4rs::append::console::ConsoleAppender;
            let stdout = ConsoleAppender::builder()
                .encoder(Box::new(PatternEncoder::new("[{l}] {m}{n}")))
                .build();
            cfg_builder.appender(Appender::builder().build("stdout", Box::new(stdout)))
        };

        cfg_builder
    };

    let root_builder = {
        let root_builder = Root::builder().appender("file");
        #[cfg(debug_assertions)]
        let root_builder = root_builder.appender("stdout");
        root_builder
    };

    let cfg = cfg_builder
        .build(root_builder.build(LevelFilter::Info))
        .map_err(|e| e.to_string())?;

    // Some other logger may already own the global slot (tests, embedder).
    if log4rs::init_config(cfg).is_err() {
        return Ok(());
    }

    std::panic::set_hook(Box::new(|info| {
        log::error!("panic: {info}");
    }));

    log::info!("logger initialized");
    log::info!("log file: {}", log_file.to_string_lossy());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test for the whole guard lifecycle: the flag is process-global, so
    // splitting these scenarios would let the runner interleave them.
    #[test]
    fn registration_guard_is_idempotent_and_releases_on_failure() {
        reset_registration();
        let scratch = std::env::temp_dir().join("cata-launcher-logger-test");
        std::fs::create_dir_all(&scratch).unwrap();

        // A logs path that can never become a directory.
        let blocker = scratch.join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        assert!(init_at(&blocker.join("logs")).is_err());
        assert!(!is_initialized(), "failed init must release the guard");

        let logs_dir = scratch.join("logs");
        init_at(&logs_dir).unwrap();
        assert!(is_initialized());

        // Second call is a clean no-op.
        init_at(&logs_dir).unwrap();
        assert!(is_initialized());

        reset_registration();
        assert!(!is_initialized());
    }
}

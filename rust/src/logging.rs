/// Platform-native logging initialization.
///
/// - iOS: tracing-oslog → Apple unified logging (os_log)
/// - Android: paranoid-android → logcat
/// - Tests / desktop: tracing-subscriber::fmt → stderr, filtered by `RUST_LOG`
///
/// Every platform adds a non-ANSI file layer at `<data_dir>/chatsync.log`
/// when `log_to_file` is set in the config.
///
/// Called once at the start of `FfiApp` construction. `try_init` makes repeated
/// calls (one per app in tests) harmless.
use tracing_subscriber::prelude::*;

const DEFAULT_FILTER: &str = "chatsync_core=debug,info";
pub(crate) const LOG_FILE_NAME: &str = "chatsync.log";

fn file_layer<S>(data_dir: &str, log_to_file: bool) -> Option<impl tracing_subscriber::Layer<S>>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    if !log_to_file {
        return None;
    }
    let log_path = std::path::Path::new(data_dir).join(LOG_FILE_NAME);
    let _ = std::fs::create_dir_all(data_dir);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok()?;
    Some(
        tracing_subscriber::fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_target(true),
    )
}

pub fn init_logging(data_dir: &str, log_to_file: bool) {
    #[cfg(target_os = "ios")]
    {
        let os_log = tracing_oslog::OsLogger::new("com.chatsync.core", "default");
        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(DEFAULT_FILTER))
            .with(os_log)
            .with(file_layer(data_dir, log_to_file))
            .try_init();
    }

    #[cfg(target_os = "android")]
    {
        let android_layer = paranoid_android::layer("chatsync")
            .with_filter(tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));
        let _ = tracing_subscriber::registry()
            .with(android_layer)
            .with(file_layer(data_dir, log_to_file))
            .try_init();
    }

    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| DEFAULT_FILTER.into());
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(file_layer(data_dir, log_to_file))
            .try_init();
    }
}

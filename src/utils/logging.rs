use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use std::env;
use std::fs;
use std::io;
use std::path::Path;
use sysinfo::System;

const DEFAULT_LOG_FILE: &str = "log.txt";

/// Initialize logging: console plus a session log file that is recreated on startup
pub fn init_logging() {
    init_logging_to(Path::new(DEFAULT_LOG_FILE));
}

/// Same as [`init_logging`] but with an explicit log file location
pub fn init_logging_to(log_path: &Path) {
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let enable_backtrace = env::var("RUST_BACKTRACE").unwrap_or_else(|_| "0".to_string()) == "1";

    // Remove existing log file if it exists
    if let Err(e) = fs::remove_file(log_path) {
        if e.kind() != io::ErrorKind::NotFound {
            eprintln!("Warning: Failed to remove existing {}: {}", log_path.display(), e);
        }
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(&log_level);
        if let Ok(directive) = "slv_world=debug".parse() {
            filter = filter.add_directive(directive);
        }
        filter
    });

    let console_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true);

    // The file layer is optional: a read-only working directory still gets console logs
    let file_layer = match fs::File::create(log_path) {
        Ok(log_file) => Some(
            fmt::layer()
                .with_writer(log_file)
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false),
        ),
        Err(e) => {
            eprintln!("Warning: Failed to create {}: {}", log_path.display(), e);
            None
        }
    };
    let file_enabled = file_layer.is_some();

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Err(e) = result {
        eprintln!("Warning: logging already initialized: {}", e);
        return;
    }

    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!("Panic occurred: {}", panic_info);

        if let Some(location) = panic_info.location() {
            tracing::error!(
                "Panic location: {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }

        if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            tracing::error!("Panic payload: {}", s);
        }

        if enable_backtrace {
            tracing::error!("Backtrace:\n{:?}", std::backtrace::Backtrace::capture());
        }
    }));

    tracing::info!("Logging initialized with level: {}", log_level);
    if file_enabled {
        tracing::info!(
            "File logging enabled: {} (session-based, cleaned on startup)",
            log_path.display()
        );
    }
    tracing::info!("Backtrace enabled: {}", enable_backtrace);
}

/// Log system information for debugging
pub fn log_system_info() {
    let mut system = System::new();
    system.refresh_memory();
    system.refresh_cpu_all();

    tracing::info!("=== System Information ===");
    tracing::info!("OS: {}", env::consts::OS);
    tracing::info!("Architecture: {}", env::consts::ARCH);
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("CPU cores: {}", system.cpus().len());
    tracing::info!("Total memory: {} MB", system.total_memory() / (1024 * 1024));
    tracing::info!("========================");
}

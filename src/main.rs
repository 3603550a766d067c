use std::process::ExitCode;

use downloads_organizer::cli::Args;
use downloads_organizer::logging::init_logging;
use downloads_organizer::pidfile::PidFile;
use downloads_organizer::{Organizer, OrganizerConfig, OrganizerError};
use log::{error, info};
use tokio::sync::mpsc;

/// Почему главный цикл завершился.
enum ShutdownReason {
    Signal(&'static str),
    WatcherFailed(OrganizerError),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match Args::parse_args().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(config.log_file.as_deref()) {
        eprintln!("Error: cannot open log file: {}", e);
        return ExitCode::FAILURE;
    }

    // PID-файл живёт внутри run() и удаляется до выхода при любом исходе.
    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Error in main program: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: OrganizerConfig) -> Result<(), OrganizerError> {
    let _pid_file = PidFile::acquire(&config.pid_file)?;
    let interval = config.sweep_interval;

    let organizer = Organizer::new(config)?;
    let (failure_tx, mut failure_rx) = mpsc::unbounded_channel();
    let running = organizer.start(move |err| {
        let _ = failure_tx.send(err);
    })?;
    info!(
        "Downloads organizer started - checking every {} min",
        interval.as_secs() / 60
    );

    let reason = wait_for_shutdown(&mut failure_rx).await;

    if let Ok(ShutdownReason::Signal(name)) = &reason {
        info!("Stop signal received: {name}");
    }
    let stopped = running.shutdown();
    info!("Organizer stopped and cleaned up properly");

    match reason? {
        ShutdownReason::Signal(_) => stopped,
        ShutdownReason::WatcherFailed(err) => Err(err),
    }
}

#[cfg(unix)]
async fn wait_for_shutdown(
    failures: &mut mpsc::UnboundedReceiver<OrganizerError>,
) -> Result<ShutdownReason, OrganizerError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = terminate.recv() => Ok(ShutdownReason::Signal("SIGTERM")),
        _ = interrupt.recv() => Ok(ShutdownReason::Signal("SIGINT")),
        Some(err) = failures.recv() => Ok(ShutdownReason::WatcherFailed(err)),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(
    failures: &mut mpsc::UnboundedReceiver<OrganizerError>,
) -> Result<ShutdownReason, OrganizerError> {
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            Ok(ShutdownReason::Signal("CTRL_C"))
        }
        Some(err) = failures.recv() => Ok(ShutdownReason::WatcherFailed(err)),
    }
}

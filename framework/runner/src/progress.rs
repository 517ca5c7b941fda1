use std::cmp::min;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressState, ProgressStyle};

use crate::shutdown::DelegatedShutdownListener;

/// Displays a progress bar while the run is going, with the active virtual users and completed
/// iterations as its message.
pub(crate) fn start_progress(
    planned_runtime: Duration,
    active_vus: Arc<AtomicUsize>,
    iterations: Arc<AtomicU64>,
    mut shutdown_listener: DelegatedShutdownListener,
) {
    let spawned = std::thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            let start_time = Instant::now();
            let pb = ProgressBar::new(planned_runtime.as_secs());
            let style = match ProgressStyle::with_template(
                "{spinner:.green} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {planned_runtime}] {msg}",
            ) {
                Ok(style) => style,
                Err(e) => {
                    log::warn!("Progress bar disabled: {e}");
                    return;
                }
            };
            pb.set_style(
                style
                    .with_key(
                        "planned_runtime",
                        move |_state: &ProgressState, w: &mut dyn Write| {
                            if let Err(e) = write_planned_runtime(w, planned_runtime) {
                                log::warn!("Could not write planned runtime: {e}");
                            }
                        },
                    )
                    .progress_chars("#>-"),
            );

            loop {
                if shutdown_listener.should_shutdown() {
                    log::trace!("Progress thread shutting down");
                    pb.finish_and_clear();
                    break;
                }

                let new = min(start_time.elapsed().as_secs(), planned_runtime.as_secs());
                pb.set_position(new);
                pb.set_message(format!(
                    "{} VUs, {} iterations",
                    active_vus.load(Ordering::Relaxed),
                    iterations.load(Ordering::Relaxed)
                ));
                std::thread::sleep(Duration::from_millis(500));
            }
        });

    if let Err(e) = spawned {
        log::warn!("Failed to start progress thread: {e}");
    }
}

fn write_planned_runtime(w: &mut dyn Write, planned_runtime: Duration) -> std::fmt::Result {
    let hours = planned_runtime.as_secs() / 3600;
    let minutes = (planned_runtime.as_secs() % 3600) / 60;
    let seconds = planned_runtime.as_secs() % 60;
    write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds)
}

use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use nfhedm::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use tracing::warn;

#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0)
            .with_style(Self::bar_style())
            .with_message("Initializing...");
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.finish_and_clear();

        Self {
            pb: Arc::new(Mutex::new(pb)),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let pb_clone = self.pb.clone();

        Box::new(move |progress: Progress| {
            let Ok(pb_guard) = pb_clone.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::PhaseStart { name, total_steps } => {
                    pb_guard.reset();
                    pb_guard.set_style(Self::bar_style());
                    pb_guard.set_length(total_steps);
                    pb_guard.set_position(0);
                    pb_guard.set_message(name.to_string());
                }
                Progress::TaskProgress { completed } => {
                    pb_guard.set_position(completed);
                }
                Progress::PhaseFinish { name } => {
                    if let Some(len) = pb_guard.length() {
                        pb_guard.set_position(len);
                    }
                    pb_guard.finish_with_message(format!("✓ {}", name));
                }
                Progress::Message(msg) => {
                    if !pb_guard.is_finished() {
                        pb_guard.println(format!("  {}", msg));
                    } else {
                        pb_guard.set_message(msg);
                    }
                }
            }
        })
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<28} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("Failed to create bar style template")
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                },
            )
            .progress_chars("##-")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn handler_initializes_in_a_clean_state() {
        let handler = CliProgressHandler::new();
        let pb = handler.pb.lock().unwrap();
        assert_eq!(pb.length(), Some(0));
        assert!(pb.is_finished());
    }

    #[test]
    fn callback_tracks_phase_lifecycle() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart {
            name: "grand_loop",
            total_steps: 7,
        });
        {
            let pb = handler.pb.lock().unwrap();
            assert_eq!(pb.message(), "grand_loop");
            assert_eq!(pb.length(), Some(7));
            assert_eq!(pb.position(), 0);
            assert!(!pb.is_finished());
        }

        callback(Progress::TaskProgress { completed: 3 });
        assert_eq!(handler.pb.lock().unwrap().position(), 3);

        callback(Progress::PhaseFinish { name: "grand_loop" });
        {
            let pb = handler.pb.lock().unwrap();
            assert!(pb.is_finished());
            assert_eq!(pb.position(), 7);
            assert_eq!(pb.message(), "✓ grand_loop");
        }
    }

    #[test]
    fn message_after_finish_replaces_the_label() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();
        callback(Progress::Message("checks passed".to_string()));
        assert_eq!(handler.pb.lock().unwrap().message(), "checks passed");
    }

    #[test]
    fn callback_is_thread_safe() {
        let handler = CliProgressHandler::new();
        let callback = handler.get_callback();

        thread::spawn(move || {
            callback(Progress::PhaseStart {
                name: "dilate image_stack",
                total_steps: 2,
            });
            callback(Progress::TaskProgress { completed: 1 });
            callback(Progress::PhaseFinish {
                name: "dilate image_stack",
            });
        })
        .join()
        .unwrap();

        let pb = handler.pb.lock().unwrap();
        assert!(pb.is_finished());
        assert_eq!(pb.message(), "✓ dilate image_stack");
    }
}

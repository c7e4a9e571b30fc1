#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart {
        name: &'static str,
        total_steps: u64,
    },
    /// Monotonic count of completed steps within the current phase.
    TaskProgress {
        completed: u64,
    },
    PhaseFinish {
        name: &'static str,
    },

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reporter_without_callback_is_silent() {
        ProgressReporter::new().report(Progress::Message("ignored".to_string()));
    }

    #[test]
    fn reporter_forwards_events_in_order() {
        let seen = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            seen.lock().unwrap().push(event);
        }));
        reporter.report(Progress::PhaseStart {
            name: "grand_loop",
            total_steps: 2,
        });
        reporter.report(Progress::TaskProgress { completed: 1 });
        drop(reporter);

        let seen = seen.into_inner().unwrap();
        assert_eq!(
            seen,
            vec![
                Progress::PhaseStart {
                    name: "grand_loop",
                    total_steps: 2
                },
                Progress::TaskProgress { completed: 1 },
            ]
        );
    }
}

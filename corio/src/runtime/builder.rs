use super::Runtime;
use crate::error::Result;

/// Builder for configuring and creating a runtime.
///
/// `Builder` allows customizing runtime parameters before constructing
/// the runtime: the size of the readiness event buffer and the number of
/// task slots reserved up front.
///
/// # Examples
///
/// ```rust,ignore
/// let runtime = Builder::new()
///     .event_capacity(256)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    /// Maximum readiness events collected per poll.
    event_capacity: usize,

    /// Task slots allocated before the first spawn.
    task_capacity: usize,
}

impl Builder {
    /// Creates a new `Builder` with default configuration.
    pub fn new() -> Self {
        Self {
            event_capacity: 64,
            task_capacity: 64,
        }
    }

    /// Sets how many readiness events a single poll can report.
    ///
    /// More ready descriptors than this are simply reported on the next
    /// iteration of the loop.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn event_capacity(mut self, n: usize) -> Self {
        assert!(n > 0, "event_capacity must be > 0");

        self.event_capacity = n;
        self
    }

    /// Sets how many task slots are reserved when the runtime is built.
    ///
    /// The scheduler grows past this as needed.
    pub fn task_capacity(mut self, n: usize) -> Self {
        self.task_capacity = n;
        self
    }

    /// Builds the runtime with the configured options.
    ///
    /// # Errors
    ///
    /// Fails if the operating system refuses to create the readiness
    /// poller.
    pub fn build(self) -> Result<Runtime> {
        tracing::debug!(
            event_capacity = self.event_capacity,
            task_capacity = self.task_capacity,
            "building runtime"
        );

        Runtime::with_config(self.event_capacity, self.task_capacity)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

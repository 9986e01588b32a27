//! Job admission and execution.
//!
//! [`Dispatcher`] is the request-time half: it validates a submission,
//! applies admission control, records the job and schedules it, either on
//! the in-process [`JobProcessor`] or on a remote worker through a
//! [`TaskQueue`]. [`JobProcessor`] is the generation-time half that drives
//! one job from `queued` to a terminal status.

pub mod dispatcher;
pub mod error;
pub mod processor;
pub mod progress;
pub mod task;

pub use dispatcher::{Dispatcher, Scheduler, SubmittedFile};
pub use error::{AcceptError, AdmissionError};
pub use processor::{JobFiles, JobInput, JobProcessor, ProcessorConfig, TaskAcceptance};
pub use task::{EnqueueError, GenerationTask, HttpTaskQueue, TaskQueue};

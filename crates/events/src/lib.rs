//! Job status propagation.
//!
//! - [`JobFanout`]: per-job multiplexing of store changes to many
//!   subscribers with independent bounded buffers.
//! - [`JobStatusService`]: lookups with lazy expiry, result retrieval and
//!   live status streams.
//! - [`StreamEvent`]: the frames of a status stream.

pub mod fanout;
pub mod status;
pub mod stream;

pub use fanout::{JobFanout, Subscription};
pub use status::{JobStatusService, StatusError};
pub use stream::{StatusStream, StreamEvent};

//! Server-sent event names for the job status stream.
//!
//! Used by `slides-events` when encoding stream frames and by clients
//! that dispatch on the event name.

/// Carries a serialized `JobUpdate`.
pub const EVENT_UPDATE: &str = "update";

/// Keep-alive frame sent while the job is idle.
pub const EVENT_PING: &str = "ping";

/// Final frame after a terminal update; the stream ends right after it.
pub const EVENT_CLOSE: &str = "close";

/// Message carried by the close frame.
pub const CLOSE_MESSAGE: &str = "Stream closing normally";

/// Receives human-readable phase messages from a running generation.
///
/// Calls are synchronous and must not block: implementations hand the
/// message off (for example to a channel) and return immediately. The
/// order of calls is the order in which observers must see the messages.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, message: &str) {
        self(message)
    }
}

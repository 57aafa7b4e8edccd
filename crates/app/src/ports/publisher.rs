//! Publisher port: the sole outbound interface to the message bus.

use std::future::Future;

use boneio_domain::message::StateMessage;

/// Sends messages to the bus, fire-and-forget.
///
/// Transport failures are the adapter's business (log, reconnect); nothing
/// is reported back to the caller.
pub trait MessagePublisher {
    /// Publish one message.
    fn send_message(&self, message: StateMessage) -> impl Future<Output = ()> + Send;
}

impl<T: MessagePublisher + Send + Sync> MessagePublisher for std::sync::Arc<T> {
    fn send_message(&self, message: StateMessage) -> impl Future<Output = ()> + Send {
        (**self).send_message(message)
    }
}

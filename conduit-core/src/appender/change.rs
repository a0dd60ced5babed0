use crate::{Appender, Error, ExecutionEvent, ExecutionToken, Flow, Result};
use std::sync::Arc;

/// Notified when an observed operation completes.
pub trait ChangeSubscriber: Send + Sync + 'static {
    fn on_change(&self, event: &ExecutionEvent);
}

impl<F> ChangeSubscriber for F
where
    F: Fn(&ExecutionEvent) + Send + Sync + 'static,
{
    fn on_change(&self, event: &ExecutionEvent) {
        self(event)
    }
}

/// Registers a completion listener forwarding to a [`ChangeSubscriber`]. Requires a
/// backend with change notification support.
#[derive(Clone)]
pub struct ChangeNotificationAppender {
    subscriber: Arc<dyn ChangeSubscriber>,
}

impl ChangeNotificationAppender {
    pub fn new(subscriber: impl ChangeSubscriber) -> Self {
        Self {
            subscriber: Arc::new(subscriber),
        }
    }
}

impl Appender for ChangeNotificationAppender {
    fn before(&self, token: &mut ExecutionToken) -> Result<Flow> {
        if !token.capabilities().change_notification {
            return Err(Error::Unsupported(format!(
                "Cannot observe {}: {} does not support change notification",
                token.operation(),
                token.source(),
            )));
        }
        let subscriber = self.subscriber.clone();
        token.add_listener(move |event| subscriber.on_change(event));
        Ok(Flow::Continue)
    }
}

//! # Subscriber Dispatch
//!
//! Routes a released batch to the subscribed handlers. A subscription
//! receives only the messages whose `x-message-type` resolves to its type
//! (or every message, for catch-all subscriptions) and that pass its
//! optional custom filter. Subscriptions run in registration order; the
//! first failure aborts the dispatch and is handed to the error policy.

use crate::ports::handler::MessageHandler;
use conduit_types::{InboundMessage, MessageTypeRegistry, ProcessingError};
use std::sync::Arc;
use tracing::trace;

pub type MessageFilter = Arc<dyn Fn(&InboundMessage) -> bool + Send + Sync>;

pub struct Subscription {
    /// Normalized type name, `None` for catch-all subscriptions.
    message_type: Option<String>,
    filter: Option<MessageFilter>,
    handler: Arc<dyn MessageHandler>,
}

impl Subscription {
    /// Subscription receiving every message.
    pub fn all(handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            message_type: None,
            filter: None,
            handler,
        }
    }

    /// Subscription receiving messages of one type.
    pub fn for_type(message_type: &str, handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            message_type: Some(MessageTypeRegistry::normalize(message_type)),
            filter: None,
            handler,
        }
    }

    #[must_use]
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&InboundMessage) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

pub struct Dispatcher {
    registry: Arc<MessageTypeRegistry>,
    subscriptions: Vec<Subscription>,
}

impl Dispatcher {
    pub fn new(registry: Arc<MessageTypeRegistry>) -> Self {
        Self {
            registry,
            subscriptions: Vec::new(),
        }
    }

    /// Add a subscription. Typed subscriptions register their type.
    pub fn subscribe(&mut self, subscription: Subscription) {
        if let Some(message_type) = &subscription.message_type {
            self.registry.register(message_type);
        }
        self.subscriptions.push(subscription);
    }

    pub fn registry(&self) -> &Arc<MessageTypeRegistry> {
        &self.registry
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn matches(&self, subscription: &Subscription, message: &InboundMessage) -> bool {
        let type_matches = match &subscription.message_type {
            None => true,
            Some(expected) => message
                .message_type()
                .and_then(|t| self.registry.resolve(t))
                .is_some_and(|resolved| &resolved == expected),
        };

        type_matches && subscription.filter.as_ref().map_or(true, |f| f(message))
    }

    /// Deliver a batch to every matching subscription.
    ///
    /// Returns the number of deliveries (one per subscription that received
    /// at least one message).
    pub async fn dispatch(&self, messages: &[InboundMessage]) -> Result<usize, ProcessingError> {
        let mut deliveries = 0;

        for subscription in &self.subscriptions {
            let selected: Vec<InboundMessage> = messages
                .iter()
                .filter(|m| self.matches(subscription, m))
                .cloned()
                .collect();

            if selected.is_empty() {
                continue;
            }

            trace!(
                message_type = ?subscription.message_type,
                count = selected.len(),
                "Dispatching to subscriber"
            );
            subscription.handler.handle_batch(&selected).await?;
            deliveries += 1;
        }

        Ok(deliveries)
    }
}

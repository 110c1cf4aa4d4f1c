//! # Message Handlers
//!
//! Business logic receives dispatched messages through [`MessageHandler`].
//! Returning an error hands the failure to the endpoint's error policy.

use async_trait::async_trait;
use conduit_types::{InboundMessage, ProcessingError};

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &InboundMessage) -> Result<(), ProcessingError>;

    /// Handle a released batch. Defaults to calling [`MessageHandler::handle`]
    /// for each message in order, stopping at the first failure.
    async fn handle_batch(&self, messages: &[InboundMessage]) -> Result<(), ProcessingError> {
        for message in messages {
            self.handle(message).await?;
        }
        Ok(())
    }
}

/// Adapts a synchronous closure into a [`MessageHandler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(&InboundMessage) -> Result<(), ProcessingError> + Send + Sync,
{
    async fn handle(&self, message: &InboundMessage) -> Result<(), ProcessingError> {
        (self.0)(message)
    }
}

//! Interception chain.
//!
//! Handlers run head to tail. Each one gets the request and a [`Next`] for the rest
//! of the chain: it can answer, fail, decline, or run the remainder itself and
//! work with the result (the recorder does this).

use crate::error::{ReplayError, Result};
use crate::fingerprint::canonical_url;
use crate::message::{Request, Response};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// What a handler did with a request.
#[derive(Debug)]
pub enum Outcome {
    /// Produced a response; the chain stops here
    Handled(Response),
    /// Not applicable; the driver moves on to the following handler
    Declined,
    /// Produced an error; the chain stops here
    Failed(ReplayError),
}

impl From<Result<Response>> for Outcome {
    fn from(result: Result<Response>) -> Self {
        match result {
            Ok(response) => Outcome::Handled(response),
            Err(err) => Outcome::Failed(err),
        }
    }
}

/// One link of the chain.
///
/// A handler that ran `next` must return what it produced (possibly changed)
/// and never `Declined`, or the remainder would run twice.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    async fn handle(&self, request: &Request, next: Next<'_>) -> Outcome;
}

/// Remainder of the chain after the current handler. Consumed by [`Next::run`].
pub struct Next<'a> {
    handlers: &'a [Arc<dyn Handler>],
}

impl<'a> Next<'a> {
    /// Run the rest of the chain for this request.
    pub async fn run(self, request: &Request) -> Result<Response> {
        drive(self.handlers, request).await
    }

    /// Number of handlers left after the current one.
    pub fn remaining(&self) -> usize {
        self.handlers.len()
    }
}

async fn drive(handlers: &[Arc<dyn Handler>], request: &Request) -> Result<Response> {
    for (index, handler) in handlers.iter().enumerate() {
        let next = Next {
            handlers: &handlers[index + 1..],
        };
        match handler.handle(request, next).await {
            Outcome::Handled(response) => return Ok(response),
            Outcome::Failed(err) => return Err(err),
            Outcome::Declined => {
                trace!("Handler '{}' declined {} {}", handler.name(), request.method, request.uri);
            }
        }
    }

    Err(ReplayError::ChainExhausted {
        method: request.method.to_string(),
        url: canonical_url(&request.uri),
    })
}

/// Ordered handler list. Later registrations run first.
#[derive(Default)]
pub struct Chain {
    handlers: RwLock<VecDeque<Arc<dyn Handler>>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handler at the head.
    pub fn prepend(&self, handler: impl Handler + 'static) -> &Self {
        self.prepend_shared(Arc::new(handler))
    }

    pub fn prepend_shared(&self, handler: Arc<dyn Handler>) -> &Self {
        self.handlers.write().push_front(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Handler names, head first.
    pub fn names(&self) -> Vec<String> {
        self.handlers
            .read()
            .iter()
            .map(|handler| handler.name().to_string())
            .collect()
    }

    /// Drive a request through the chain.
    pub async fn start(&self, request: &Request) -> Result<Response> {
        // Snapshot so registration never waits on in-flight requests
        let handlers: Vec<Arc<dyn Handler>> = self.handlers.read().iter().cloned().collect();
        drive(&handlers, request).await
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("handlers", &self.names()).finish()
    }
}

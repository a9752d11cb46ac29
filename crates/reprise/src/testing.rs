//! Test doubles shared by unit tests.

use crate::error::{ReplayError, Result};
use crate::message::{Request, Response};
use crate::transport::Transport;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Transport that answers from memory and counts calls.
pub struct StubTransport {
    reply: std::result::Result<Response, String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<Request>>,
}

impl StubTransport {
    pub fn ok(body: &str) -> Self {
        Self::responding(Response::new(200).with_body(body.to_string()))
    }

    pub fn responding(response: Response) -> Self {
        Self {
            reply: Ok(response),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_uri(&self) -> Option<String> {
        self.last_request.lock().as_ref().map(|r| r.uri.to_string())
    }

    /// Value of `name` on the last request sent.
    pub fn last_header(&self, name: &str) -> Option<String> {
        self.last_request
            .lock()
            .as_ref()
            .and_then(|r| r.headers.get(name)?.to_str().ok().map(str::to_string))
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: &Request) -> Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());
        self.reply.clone().map_err(ReplayError::Transport)
    }
}

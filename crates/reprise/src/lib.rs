//! Record and replay outbound HTTP traffic.
//!
//! Applications send requests through a [`Client`]. Each request walks the
//! interception chain, where handlers decide whether it goes to the network, to
//! localhost, or is answered from recorded fixtures, depending on the session's
//! [`Mode`].
//!
//! ```no_run
//! use reprise::{Client, Config, Mode, Request};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::default()
//!     .with_mode(Mode::Record)
//!     .with_fixtures_dir("tests/fixtures");
//! let client = Client::from_config(&config)?;
//! client.pass_through(["*.amazonaws.com"]);
//!
//! let response = client.send(Request::get("https://api.example.com/users")?).await?;
//! println!("{} {}", response.status, response.text());
//! # Ok(())
//! # }
//! ```

// ===== Core =====
pub mod catalog;
pub mod chain;
pub mod client;
pub mod error;
pub mod fingerprint;
pub mod handlers;
pub mod hosts;
pub mod message;
pub mod mode;
pub mod session;
pub mod transport;

// ===== Ambient =====
pub mod config;
pub mod metrics;

#[cfg(test)]
mod testing;

pub use catalog::{Catalog, ExhaustionPolicy, FileStore, FixtureEntry, FixtureStore};
pub use chain::{Chain, Handler, Next, Outcome};
pub use client::Client;
pub use config::Config;
pub use error::{ReplayError, Result};
pub use fingerprint::{Fingerprint, HeaderMatchList};
pub use hosts::{HostClassifier, HostMatcher};
pub use message::{Request, Response};
pub use mode::Mode;
pub use session::Session;
pub use transport::{HyperTransport, Transport};

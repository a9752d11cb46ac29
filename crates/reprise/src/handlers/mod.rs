//! Built-in chain handlers.
//!
//! # Module Structure
//!
//! - `logger` - Logs requests and their outcome
//! - `pass_through` - Live forwarding, direct or to the loopback address
//! - `replay` - Answers from the fixture catalog
//! - `recorder` - Stores live responses in record mode

mod logger;
mod pass_through;
mod recorder;
mod replay;

pub use logger::Logger;
pub use pass_through::PassThrough;
pub use recorder::Recorder;
pub use replay::Replay;

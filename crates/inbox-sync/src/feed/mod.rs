//! Server-pushed change feed: wire events, provider seam, and the runner
//! that pumps feed signals into the store.

mod events;
mod provider;
mod runner;

pub use events::{ChangeEvent, ChangeOp, FeedSignal};
pub use provider::{DEFAULT_SIGNAL_BUFFER, FeedProvider, FeedSubscription};
pub(crate) use runner::FeedRunner;

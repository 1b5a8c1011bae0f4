// Background observers for request side effects (usage counting, activity
// log, notifications). See `dispatcher` for the queue.

pub mod dispatcher;
pub mod error;
pub mod implementations;
pub mod traits;

pub use dispatcher::ObserverDispatcher;
pub use error::ObserverError;
pub use traits::{EventKind, Observer, ObserverEvent};

//! Paging fetch machinery: the cursor state machine, its retry policy, the
//! proxy pool, and the async driver that executes cursor actions.

pub mod backoff;
pub mod cursor;
pub mod proxy;
pub(crate) mod task;

pub use backoff::RetryPolicy;
pub use cursor::{CursorAction, CursorEvent, CursorState, FetchCursor, FetchTask};
pub use proxy::{ProxyPool, SESSION_PLACEHOLDER};

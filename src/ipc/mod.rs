mod error;
mod handlers;
mod helpers;
mod router;
mod types;
mod watch;

pub use handlers::core::select_workspace;
pub use router::{drain_events, handle_request};
pub use types::{AppState, Request};

//! Development mode for leafdev.
//!
//! Rebuilds the site whenever a watched source file is added or changed and
//! serves the build output over HTTP.

pub mod server;
pub mod session;
pub mod watch_loop;
pub mod watcher;

pub use server::{BoundServer, DevServer, DevServerConfig, ServerError};
pub use session::{DevSession, SessionConfig, SessionError};
pub use watch_loop::{WatchLoop, WatchState};
pub use watcher::{FileWatcher, WatchEvent, WatchEventKind, WatchSignal};

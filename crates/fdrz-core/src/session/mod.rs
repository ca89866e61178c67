//! Client-side authentication session.

pub mod guard;
pub mod state;
pub mod storage;
pub mod store;

pub use guard::Access;
pub use state::{AuthStatus, SessionState, User};
pub use storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage};
pub use store::SessionStore;

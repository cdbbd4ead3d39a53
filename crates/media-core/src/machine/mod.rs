mod session;
mod state;
mod timer;

pub use session::{AssetSession, SessionContext};
pub use state::{LoadState, LoadStateMachine, LoadStatus, Step};
pub use timer::ScopedTimer;

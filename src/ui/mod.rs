mod accessibility;
mod binding;
mod event;
mod state;

pub use accessibility::*;
pub use binding::*;
pub use event::*;
pub use state::*;

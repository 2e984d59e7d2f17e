//! Floating surfaces painted above the element tree: popup menus, context
//! menus and dropdown lists.

mod host;
mod menu;
mod menu_overlay;
pub mod placement;

pub use host::*;
pub use menu::*;
pub use menu_overlay::*;

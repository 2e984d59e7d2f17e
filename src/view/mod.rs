pub mod base_component;
pub mod overlay;
pub mod viewport;

pub use base_component::*;
pub use overlay::{ContextMenu, Menu, MenuItem, MenuOverlay, OverlayHost, OverlayId};
pub use viewport::*;

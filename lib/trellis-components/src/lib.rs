mod combo_box;
mod entry;
mod label;
mod link;
mod tab_control;
mod theme;

#[cfg(test)]
mod testing;

pub use combo_box::*;
pub use entry::*;
pub use label::*;
pub use link::*;
pub use tab_control::*;
pub use theme::Palette;

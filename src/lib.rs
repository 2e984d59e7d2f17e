//! Retained-mode UI core: a measure/arrange/render element tree, run-based
//! rich text with shared paints, and floating menus drawn above the tree.
//!
//! Rendering goes through the [`render::Canvas`] trait and text measurement
//! through [`text::TextMeasurer`]; platform windowing and input capture live
//! outside this crate.

pub mod config;
pub mod error;
pub mod geometry;
pub mod render;
pub mod style;
pub mod text;
pub mod ui;
pub mod view;

pub use config::ToolkitConfig;
pub use error::{Result, UiError};
pub use geometry::{Margin, Point, Rect, Size};
pub use view::*;

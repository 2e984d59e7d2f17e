mod canvas;

pub use canvas::{Canvas, DrawCommand, RecordingCanvas};

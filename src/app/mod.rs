mod state;
mod surface;

pub use state::{App, Options};
pub use surface::EditorSurface;

mod blur;
pub mod cpu;
pub mod orientation;
pub mod painter;
pub mod recording;
/// Drawing-surface seam between the scene renderer and a raster backend.
pub mod surface;
pub mod text;

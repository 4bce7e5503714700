pub mod color;
pub mod rect;

pub mod correlate;
pub mod mesh;

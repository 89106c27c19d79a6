pub mod fft;
pub mod spatial_grid;

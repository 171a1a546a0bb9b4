//! Pixel helpers shared by the texture decoders and the front ends

pub mod color;

pub use color::ColorOps;

#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// I/O utilities for reading and writing reconstruction inputs.
pub mod io;

/// Rotation and rigid transform algorithms.
pub mod transforms;

/// Conversions between fixed-size arrays and faer matrices.
pub mod utils;

//! Binary codec primitives shared by the program loaders.
//!
//! - `encoding`: fixed-width and variable-length integers, bit packing
//!
//! Decoders take `&mut &[u8]` and never allocate unless the output needs it.

pub mod encoding;

//! GF(2⁸) arithmetic and the P/Q syndrome codec.

pub mod gf;
pub mod syndrome;

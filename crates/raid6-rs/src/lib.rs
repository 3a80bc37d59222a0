//! RAID-6 storage engine: GF(2⁸) syndrome coding, rotating P/Q stripes,
//! dual-failure recovery and a block-chained file layer.

pub mod codec;
pub mod error;
pub mod layout;
pub mod metrics;
pub mod retention;
pub mod store;

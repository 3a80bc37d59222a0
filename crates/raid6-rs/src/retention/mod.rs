//! Disk adapters, the array contract and the recovering stripe layer.

pub mod array;
pub mod disk;
pub mod volume;

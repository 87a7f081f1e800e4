//! Small helpers shared by the device and the backends

pub mod index_pool;

pub use index_pool::IndexPool;

//! Command recording

pub mod command;
pub mod encoder;

pub use command::*;
pub use encoder::{CommandEncoder, PassKind};

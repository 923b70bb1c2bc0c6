//! Native XML scene library I/O.

pub mod read;
pub mod write;

pub use read::{read_hsx, read_hsx_str};
pub use write::{write_hsx, write_hsx_string};

//! I/O elements for reading and writing containers.
//!
//! - [`FileSrc`]: reads the input container
//! - [`FileSink`]: writes the output container

mod file;

pub use file::{FileSink, FileSrc};

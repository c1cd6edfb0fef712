//! The watched directory: listing, reading and parsing descriptor files.

pub mod parser;
pub mod scanner;

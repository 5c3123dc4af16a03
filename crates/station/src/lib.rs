//! Station console: a line-oriented front end over the print pipeline.

pub mod command;
pub mod console;

pub use command::{COLORS_VAR, Command, parse_catalog};
pub use console::execute;

//! Input and output formats used by the command-line driver.

pub mod csv;
pub mod project_file;

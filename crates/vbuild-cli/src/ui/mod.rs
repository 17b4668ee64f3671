//! Terminal output

mod console;
mod progress;

pub use console::ConsoleReporter;
pub use progress::{format_bytes, format_progress};

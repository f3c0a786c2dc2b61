//! Progress reporting.

/// A fire-and-forget text sink for user-visible progress.
///
/// The engine never consults a return value for control flow; a reporter
/// that drops messages only affects what the operator sees.
pub trait Reporter {
    fn report(&self, message: &str);
}

/// Prints progress lines to stdout.
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, message: &str) {
        println!("{message}");
    }
}

/// The parser's handle on the standard streams. Injectable, so tests (and
/// embedding programs) can capture the usage, help, and error output.
pub trait UserInterface {
    /// Write a line to the output stream (help, usage, version).
    fn print(&self, message: String);

    /// Write a line to the error stream (usage + error message).
    fn print_error(&self, message: String);
}

/// The production [`UserInterface`]: stdout and stderr.
#[derive(Default)]
pub struct ConsoleInterface {}

impl UserInterface for ConsoleInterface {
    fn print(&self, message: String) {
        println!("{message}");
    }

    fn print_error(&self, message: String) {
        eprintln!("{message}");
    }
}

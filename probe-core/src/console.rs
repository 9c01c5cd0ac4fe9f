//! Text output for the probe firmware.
//!
//! The `ProbeConsole` trait is the firmware's `print` primitive. It works
//! identically for tests (HeadlessConsole) and a real terminal.

/// Console interface for probe text output.
pub trait ProbeConsole: Send {
    /// Write text to the console as-is.
    fn print(&mut self, text: &str);

    /// Write text followed by a newline.
    fn println(&mut self, text: &str) {
        self.print(text);
        self.print("\n");
    }
}

/// Headless console for testing - captures output.
#[derive(Default)]
pub struct HeadlessConsole {
    output: String,
}

impl HeadlessConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all output.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Output split into lines.
    pub fn lines(&self) -> Vec<&str> {
        self.output.lines().collect()
    }

    /// Clear output buffer.
    pub fn clear_output(&mut self) {
        self.output.clear();
    }
}

impl ProbeConsole for HeadlessConsole {
    fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }
}

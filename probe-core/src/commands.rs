//! Command table - exact command text to handler.

use std::collections::HashMap;

use crate::uplink::CaptureAction;

/// Capture a picture and send it back to the sender.
pub const TAKE_PICTURE: &str = "TAKE_PICTURE";

/// Handler invoked with the sender of the message. Its outcome is not
/// reported back to the dispatcher.
pub trait CommandHandler: Send {
    fn handle(&mut self, sender: &str);
}

impl<F> CommandHandler for F
where
    F: FnMut(&str) + Send,
{
    fn handle(&mut self, sender: &str) {
        self(sender)
    }
}

/// Case-sensitive, exact-match command table.
#[derive(Default)]
pub struct CommandTable {
    handlers: HashMap<String, Box<dyn CommandHandler>>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stock vocabulary: `TAKE_PICTURE` runs the capture action.
    pub fn with_capture(mut capture: impl CaptureAction + 'static) -> Self {
        let mut table = Self::new();
        table.register(TAKE_PICTURE, move |sender: &str| {
            capture.capture_and_send(sender)
        });
        table
    }

    /// Add or replace a command.
    pub fn register(&mut self, command: impl Into<String>, handler: impl CommandHandler + 'static) {
        self.handlers.insert(command.into(), Box::new(handler));
    }

    pub fn contains(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    /// Registered command names, sorted.
    pub fn commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run the handler for `command`. Returns false if nothing matched.
    pub fn invoke(&mut self, command: &str, sender: &str) -> bool {
        match self.handlers.get_mut(command) {
            Some(handler) => {
                handler.handle(sender);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uplink::RecordingCapture;

    #[test]
    fn test_take_picture_routes_sender() {
        let record = RecordingCapture::new();
        let mut table = CommandTable::with_capture(record.clone());

        assert!(table.invoke(TAKE_PICTURE, "Earth"));
        assert_eq!(record.calls(), vec!["Earth"]);
    }

    #[test]
    fn test_exact_match_only() {
        let record = RecordingCapture::new();
        let mut table = CommandTable::with_capture(record.clone());

        assert!(!table.invoke("take_picture", "Earth"));
        assert!(!table.invoke("TAKE_PICTURE ", "Earth"));
        assert!(!table.invoke("TAKE", "Earth"));
        assert!(record.calls().is_empty());
    }

    #[test]
    fn test_register_extends_table() {
        let mut table = CommandTable::new();
        table.register("PING", |_: &str| {});
        table.register("STATUS", |_: &str| {});

        assert_eq!(table.commands(), vec!["PING", "STATUS"]);
        assert!(table.contains("PING"));
        assert!(table.invoke("STATUS", "Mars"));
    }
}

/*
Copyright 2025 Google LLC

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

     https://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use std::io::Write;

use crate::{backtrace::Backtrace, flags::FLAGS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    AuthorWarning,
    AuthorError,
    FatalError,
    InternalError,
    Message,
    Warning,
    Log,
    DeprecationWarning,
    DeprecationError,
}

impl MessageType {
    pub fn is_error(self) -> bool {
        matches!(
            self,
            MessageType::AuthorError
                | MessageType::FatalError
                | MessageType::InternalError
                | MessageType::DeprecationError
        )
    }

    fn title(self) -> &'static str {
        match self {
            MessageType::AuthorWarning => "CMake Warning (dev)",
            MessageType::AuthorError => "CMake Error (dev)",
            MessageType::FatalError => "CMake Error",
            MessageType::InternalError => "CMake Internal Error (please report a bug)",
            MessageType::Message => "CMake Message",
            MessageType::Warning => "CMake Warning",
            MessageType::Log => "CMake Debug Log",
            MessageType::DeprecationWarning => "CMake Deprecation Warning",
            MessageType::DeprecationError => "CMake Deprecation Error",
        }
    }
}

/// Where diagnostics go. Tests use [`Messenger::capturing`] to inspect what
/// a script printed instead of writing to the terminal.
pub struct Messenger {
    color: bool,
    captured: Option<Vec<(MessageType, String)>>,
    pub suppress_dev_warnings: bool,
}

impl Default for Messenger {
    fn default() -> Self {
        Self::new()
    }
}

impl Messenger {
    pub fn new() -> Self {
        Messenger {
            color: FLAGS.color_warnings,
            captured: None,
            suppress_dev_warnings: false,
        }
    }

    pub fn capturing() -> Self {
        Messenger {
            color: false,
            captured: Some(Vec::new()),
            suppress_dev_warnings: false,
        }
    }

    pub fn captured(&self) -> &[(MessageType, String)] {
        self.captured.as_deref().unwrap_or(&[])
    }

    /// Captured texts of the given type, in order.
    pub fn texts(&self, t: MessageType) -> Vec<&str> {
        self.captured()
            .iter()
            .filter(|(ct, _)| *ct == t)
            .map(|(_, s)| s.as_str())
            .collect()
    }

    pub fn issue(&mut self, t: MessageType, text: &str, bt: &Backtrace) {
        if self.suppress_dev_warnings && t == MessageType::AuthorWarning {
            return;
        }
        if let Some(captured) = &mut self.captured {
            captured.push((t, text.to_string()));
            return;
        }
        let out = format_message(t, text, bt, self.color);
        let _ = std::io::stderr().write_all(out.as_bytes());
    }

    /// `message(STATUS ...)` and friends.
    pub fn display_status(&mut self, text: &str) {
        if let Some(captured) = &mut self.captured {
            captured.push((MessageType::Message, format!("-- {text}")));
            return;
        }
        println!("-- {text}");
    }

    /// `--trace` output.
    pub fn display_log(&mut self, text: &str) {
        if let Some(captured) = &mut self.captured {
            captured.push((MessageType::Log, text.to_string()));
            return;
        }
        eprintln!("{text}");
    }

    /// `message(...)` with no mode prints the text as is.
    pub fn display_plain(&mut self, text: &str) {
        if let Some(captured) = &mut self.captured {
            captured.push((MessageType::Message, text.to_string()));
            return;
        }
        eprintln!("{text}");
    }
}

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";
const MAGENTA: &str = "\x1b[35m";
const RED: &str = "\x1b[31m";

pub fn format_message(t: MessageType, text: &str, bt: &Backtrace, color: bool) -> String {
    let mut title = t.title().to_string();
    if let Some(frame) = bt.top_command() {
        title.push_str(&format!(" at {}", frame));
    } else if let Some(frame) = bt.top() {
        title.push_str(&format!(" in {}", frame));
    }
    title.push(':');
    if color {
        let c = if t.is_error() { RED } else { MAGENTA };
        title = format!("{BOLD}{c}{title}{RESET}");
    }

    let mut out = title;
    out.push('\n');
    for line in text.lines() {
        if line.is_empty() {
            out.push('\n');
        } else {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
    }
    let stack = bt.call_stack();
    if !stack.is_empty() {
        out.push_str("Call Stack (most recent call first):\n");
        for frame in stack {
            out.push_str("  ");
            out.push_str(&frame);
            out.push('\n');
        }
    }
    if t == MessageType::AuthorWarning {
        out.push_str("This warning is for project developers.  Use -Wno-dev to suppress it.\n");
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loc::Loc;

    #[test]
    fn test_format_message() {
        let bt = Backtrace::empty()
            .push_file("CMakeLists.txt")
            .push_command(Loc::new("CMakeLists.txt", 7), "f")
            .push_command(Loc::new("CMakeLists.txt", 3), "message");
        let out = format_message(MessageType::FatalError, "boom\nsecond", &bt, false);
        assert_eq!(
            out,
            "CMake Error at CMakeLists.txt:3 (message):\n  boom\n  second\n\
             Call Stack (most recent call first):\n  CMakeLists.txt:7 (f)\n\n"
        );
    }

    #[test]
    fn test_capturing() {
        let mut m = Messenger::capturing();
        m.display_plain("3");
        m.display_status("hello");
        m.issue(MessageType::Warning, "careful", &Backtrace::empty());
        assert_eq!(m.texts(MessageType::Message), vec!["3", "-- hello"]);
        assert_eq!(m.texts(MessageType::Warning), vec!["careful"]);
    }
}

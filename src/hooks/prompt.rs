//! Operator interaction seam for hook input collection.

use crate::error::Result;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Collects input from the operator. `prompt` returning `None` means the
/// operator cancelled (EOF), which is fatal to the whole run.
pub trait Prompter {
    /// Display instructional text.
    fn show(&mut self, text: &str);

    /// Ask for one value. `None` on cancellation.
    fn prompt(&mut self, message: &str) -> Result<Option<String>>;
}

/// Terminal prompter: messages on stderr, values from stdin.
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn show(&mut self, text: &str) {
        eprintln!("{}", text);
    }

    fn prompt(&mut self, message: &str) -> Result<Option<String>> {
        eprint!("{}: ", message);
        io::stderr().flush().ok();

        let mut input = String::new();
        let bytes = io::stdin().lock().read_line(&mut input)?;
        if bytes == 0 {
            // EOF: operator closed stdin
            return Ok(None);
        }
        Ok(Some(input.trim().to_string()))
    }
}

/// Scripted prompter for tests and non-interactive embedding: answers are
/// consumed in order; running out of answers reads as a cancellation.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub shown: Vec<String>,
    pub prompts: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            shown: Vec::new(),
            prompts: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn show(&mut self, text: &str) {
        self.shown.push(text.to_string());
    }

    fn prompt(&mut self, message: &str) -> Result<Option<String>> {
        self.prompts.push(message.to_string());
        Ok(self.answers.pop_front())
    }
}

//! Operator prompts: dialoguer on a terminal, plain line reads otherwise.

use std::cell::RefCell;
use std::io::{self, BufRead, IsTerminal, Write};

use dialoguer::{Confirm, Input};
use ramprofile_core::host::Prompter;

/// Pick the prompter for the current stdin.
pub fn for_stdin() -> Box<dyn Prompter> {
    if io::stdin().is_terminal() {
        Box::new(TerminalPrompter)
    } else {
        Box::new(LinePrompter::new(io::stdin().lock()))
    }
}

pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask_line(&self, prompt: &str) -> io::Result<String> {
        Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(io::Error::other)
    }

    fn confirm(&self, prompt: &str, default: bool) -> io::Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
            .map_err(io::Error::other)
    }
}

/// Reads one answer per line. End of input answers "" and "no".
pub struct LinePrompter<R> {
    input: RefCell<R>,
}

impl<R: BufRead> LinePrompter<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: RefCell::new(input),
        }
    }

    fn read_answer(&self, prompt: &str) -> io::Result<Option<String>> {
        let mut stderr = io::stderr().lock();
        write!(stderr, "{prompt}: ")?;
        stderr.flush()?;

        let mut line = String::new();
        let read = self.input.borrow_mut().read_line(&mut line)?;
        writeln!(stderr)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead> Prompter for LinePrompter<R> {
    fn ask_line(&self, prompt: &str) -> io::Result<String> {
        Ok(self.read_answer(prompt)?.unwrap_or_default())
    }

    fn confirm(&self, prompt: &str, default: bool) -> io::Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        let answer = self.read_answer(&format!("{prompt} {hint}"))?;
        Ok(match answer.as_deref() {
            None => false,
            Some("") => default,
            Some(text) => matches!(text.to_ascii_lowercase().as_str(), "y" | "yes"),
        })
    }
}

// gitvault-core/src/auth/terminal.rs
//
// Terminal prompting. All user-facing text goes to stderr (or the TTY
// directly); stdout is reserved for the Git protocol.

use std::io::{BufRead, Write};

use gitvault_common::error::Error;

pub trait Terminal: Send + Sync {
    fn write_line(&self, message: &str);
    fn prompt(&self, label: &str) -> Result<String, Error>;
    /// Prompt for a secret without echoing it.
    fn prompt_secret(&self, label: &str) -> Result<String, Error>;
}

pub struct StdTerminal;

impl StdTerminal {
    #[cfg(unix)]
    fn read_line_tty() -> Result<String, Error> {
        // Git talks to us over stdin, so interactive answers come from the
        // controlling terminal when one exists.
        match std::fs::File::open("/dev/tty") {
            Ok(tty) => {
                let mut line = String::new();
                std::io::BufReader::new(tty).read_line(&mut line)?;
                Ok(line.trim_end_matches(['\r', '\n']).to_string())
            }
            Err(_) => Self::read_line_stdin(),
        }
    }

    #[cfg(not(unix))]
    fn read_line_tty() -> Result<String, Error> {
        Self::read_line_stdin()
    }

    fn read_line_stdin() -> Result<String, Error> {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl Terminal for StdTerminal {
    fn write_line(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn prompt(&self, label: &str) -> Result<String, Error> {
        eprint!("{}: ", label);
        let _ = std::io::stderr().flush();
        Self::read_line_tty()
    }

    fn prompt_secret(&self, label: &str) -> Result<String, Error> {
        rpassword::prompt_password(format!("{}: ", label))
            .map_err(|e| Error::Auth(format!("failed to read secret from terminal: {}", e)))
    }
}

/// A numbered single-choice menu. Empty input selects the default item;
/// anything unparseable re-prompts.
pub struct TerminalMenu<'a> {
    terminal: &'a dyn Terminal,
    title: String,
    items: Vec<String>,
}

impl<'a> TerminalMenu<'a> {
    pub fn new(terminal: &'a dyn Terminal, title: impl Into<String>) -> Self {
        Self {
            terminal,
            title: title.into(),
            items: Vec::new(),
        }
    }

    /// Adds an item and returns its index.
    pub fn add(&mut self, label: impl Into<String>) -> usize {
        self.items.push(label.into());
        self.items.len() - 1
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Shows the menu and blocks for a selection. Returns the chosen index.
    pub fn show(&self, default: usize) -> Result<usize, Error> {
        assert!(!self.items.is_empty(), "menu must have at least one item");
        loop {
            self.terminal.write_line(&self.title);
            for (i, item) in self.items.iter().enumerate() {
                self.terminal.write_line(&format!("  {}. {}", i + 1, item));
            }
            let answer = self.terminal.prompt("option (enter for default)")?;
            if answer.trim().is_empty() {
                return Ok(default);
            }
            match answer.trim().parse::<usize>() {
                Ok(n) if n >= 1 && n <= self.items.len() => return Ok(n - 1),
                _ => self.terminal.write_line("Invalid option"),
            }
        }
    }
}

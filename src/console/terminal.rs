//! Process console: stdout, stderr and a no-echo terminal prompt.

use std::io::{self, Write};

use dialoguer::Password;

use super::{Console, Stream};

/// [`Console`] backed by the process streams.
///
/// Secrets are read with [`dialoguer::Password`], which switches the terminal to raw mode
/// for the duration of the prompt.
#[derive(Debug, Default)]
pub struct TerminalConsole;

impl TerminalConsole {
    /// Creates the process console.
    pub fn new() -> Self {
        Self
    }
}

impl Console for TerminalConsole {
    fn write(&mut self, stream: Stream, bytes: &[u8]) -> io::Result<()> {
        match stream {
            Stream::Out => io::stdout().lock().write_all(bytes),
            Stream::Err => io::stderr().lock().write_all(bytes),
        }
    }

    fn flush(&mut self, stream: Stream) -> io::Result<()> {
        match stream {
            Stream::Out => io::stdout().flush(),
            Stream::Err => io::stderr().flush(),
        }
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<String> {
        Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .map_err(io::Error::other)
    }
}

//! In-memory console.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Console, Stream};

/// [`Console`] that records output in memory and answers prompts from a script.
///
/// Clones share the same buffers, so keep one clone to inspect what the runtime wrote.
///
/// ## Example
/// ```rust
/// use taskgate::{BufferConsole, Console, Stream};
///
/// let console = BufferConsole::with_secrets(["hunter2"]);
/// let mut owned = console.clone();
/// owned.write(Stream::Out, b"hello\n").unwrap();
///
/// assert_eq!(owned.read_secret("password").unwrap(), "hunter2");
/// assert_eq!(console.out(), "hello\n");
/// assert_eq!(console.prompts(), vec!["password".to_string()]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct BufferConsole {
    inner: Arc<Mutex<Buffers>>,
}

#[derive(Debug, Default)]
struct Buffers {
    out: Vec<u8>,
    err: Vec<u8>,
    secrets: VecDeque<String>,
    prompts: Vec<String>,
}

impl BufferConsole {
    /// Creates an empty console with no scripted secrets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a console that answers secret prompts with `secrets`, in order.
    pub fn with_secrets<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let console = Self::default();
        console
            .lock()
            .secrets
            .extend(secrets.into_iter().map(Into::into));
        console
    }

    /// Everything written to [`Stream::Out`] so far.
    pub fn out(&self) -> String {
        String::from_utf8_lossy(&self.lock().out).into_owned()
    }

    /// Everything written to [`Stream::Err`] so far.
    pub fn err(&self) -> String {
        String::from_utf8_lossy(&self.lock().err).into_owned()
    }

    /// Prompts shown so far.
    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Buffers> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Console for BufferConsole {
    fn write(&mut self, stream: Stream, bytes: &[u8]) -> io::Result<()> {
        let mut buffers = self.lock();
        match stream {
            Stream::Out => buffers.out.extend_from_slice(bytes),
            Stream::Err => buffers.err.extend_from_slice(bytes),
        }
        Ok(())
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<String> {
        let mut buffers = self.lock();
        buffers.prompts.push(prompt.to_string());
        buffers.secrets.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted secret left")
        })
    }
}

//! The coordinator loop and the client side used by task handles.

use std::io;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::{Console, Stream};
use crate::error::TaskError;

/// One interactive request.
pub(crate) enum IoRequest {
    Write {
        stream: Stream,
        bytes: Vec<u8>,
    },
    Secret {
        unit: Arc<str>,
        prompt: String,
        reply: oneshot::Sender<io::Result<String>>,
    },
    Stop,
}

/// Sending half, cloned into every handle.
#[derive(Clone, Debug)]
pub(crate) struct IoClient {
    tx: mpsc::UnboundedSender<IoRequest>,
}

/// Receiving half, consumed by [`serve`].
pub(crate) struct IoInbox {
    rx: mpsc::UnboundedReceiver<IoRequest>,
}

impl IoClient {
    /// Creates a connected client/inbox pair. Requests queue up until [`serve`] runs.
    pub(crate) fn channel() -> (IoClient, IoInbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (IoClient { tx }, IoInbox { rx })
    }

    /// Queues `bytes` for `stream`; dropped silently once the coordinator is gone.
    pub(crate) fn write(&self, stream: Stream, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        let _ = self.tx.send(IoRequest::Write { stream, bytes });
    }

    /// Asks the coordinator for a secret and waits for the answer.
    pub(crate) async fn secret(&self, unit: &Arc<str>, prompt: String) -> Result<String, TaskError> {
        let (reply, answer) = oneshot::channel();
        let request = IoRequest::Secret {
            unit: Arc::clone(unit),
            prompt,
            reply,
        };
        self.tx.send(request).map_err(|_| console_closed())?;
        answer.await.map_err(|_| console_closed())?.map_err(TaskError::from)
    }

    /// Asks the coordinator to exit after everything queued so far.
    pub(crate) fn stop(&self) {
        let _ = self.tx.send(IoRequest::Stop);
    }
}

fn console_closed() -> TaskError {
    TaskError::Io {
        error: "console coordinator stopped".to_string(),
    }
}

/// Coordinator loop: owns the console until `Stop` (or every client is gone).
///
/// Blocking; run it on a dedicated thread.
pub(crate) fn serve(mut console: Box<dyn Console>, inbox: IoInbox) -> Box<dyn Console> {
    let IoInbox { mut rx } = inbox;
    while let Some(request) = rx.blocking_recv() {
        match request {
            IoRequest::Write { stream, bytes } => {
                // No caller to report to; a broken pipe only loses this output.
                let _ = console
                    .write(stream, &bytes)
                    .and_then(|()| console.flush(stream));
            }
            IoRequest::Secret {
                unit,
                prompt,
                reply,
            } => {
                let prompt = if prompt.is_empty() {
                    format!("{unit} secret")
                } else {
                    prompt
                };
                let _ = reply.send(console.read_secret(&prompt));
            }
            IoRequest::Stop => break,
        }
    }
    console
}

/// `std::io::Write` adapter that forwards each `write` call as one request.
///
/// Wrap it in a [`std::io::LineWriter`] to emit whole lines from many small writes.
#[derive(Clone, Debug)]
pub struct ConsoleWriter {
    io: IoClient,
    stream: Stream,
}

impl ConsoleWriter {
    pub(crate) fn new(io: IoClient, stream: Stream) -> Self {
        Self { io, stream }
    }
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.io.write(self.stream, buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::BufferConsole;
    use std::io::Write;

    #[tokio::test]
    async fn requests_are_served_in_order_until_stop() {
        let console = BufferConsole::with_secrets(["s3cr3t"]);
        let (client, inbox) = IoClient::channel();

        client.write(Stream::Out, b"one ".to_vec());
        let mut writer = ConsoleWriter::new(client.clone(), Stream::Out);
        writer.write_all(b"two ").unwrap();

        let boxed: Box<dyn Console> = Box::new(console.clone());
        let coordinator = tokio::task::spawn_blocking(move || serve(boxed, inbox));

        let unit: Arc<str> = Arc::from("upload");
        assert_eq!(client.secret(&unit, "token".into()).await.unwrap(), "s3cr3t");
        client.write(Stream::Out, b"three".to_vec());
        client.write(Stream::Err, b"oops".to_vec());
        client.stop();
        coordinator.await.unwrap();

        assert_eq!(console.out(), "one two three");
        assert_eq!(console.err(), "oops");
        assert_eq!(console.prompts(), vec!["token".to_string()]);
    }

    #[tokio::test]
    async fn secrets_fail_once_the_coordinator_is_gone() {
        let (client, inbox) = IoClient::channel();
        let boxed: Box<dyn Console> = Box::new(BufferConsole::new());
        client.stop();
        tokio::task::spawn_blocking(move || serve(boxed, inbox))
            .await
            .unwrap();

        let unit: Arc<str> = Arc::from("upload");
        let err = client.secret(&unit, String::new()).await.unwrap_err();
        assert_eq!(err.as_label(), "task_io");
    }

    #[tokio::test]
    async fn empty_prompts_name_the_unit() {
        let console = BufferConsole::with_secrets(["x"]);
        let (client, inbox) = IoClient::channel();
        let boxed: Box<dyn Console> = Box::new(console.clone());
        let coordinator = tokio::task::spawn_blocking(move || serve(boxed, inbox));

        let unit: Arc<str> = Arc::from("backup-7");
        client.secret(&unit, String::new()).await.unwrap();
        client.stop();
        coordinator.await.unwrap();

        assert_eq!(console.prompts(), vec!["backup-7 secret".to_string()]);
    }
}

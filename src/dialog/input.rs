//! Text-input dialog capability.
//!
//! The dialog itself lives outside this crate. A request is answered through a
//! oneshot responder; dropping the responder without answering is a cancel.

use std::fmt;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// What the dialog should display.
#[derive(Debug, Clone, PartialEq)]
pub struct InputPrompt {
    pub title: String,
    pub placeholder: String,
    pub default_value: String,
}

/// Dialog errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DialogError {
    #[error("Dialog service is not accepting requests")]
    ChannelClosed,
}

/// Pending answer to an [`InputPrompt`].
///
/// Resolves to the entered text, or to a `RecvError` if the dialog was
/// cancelled.
pub type PendingInput = oneshot::Receiver<String>;

/// Something that can show a text prompt to the user.
pub trait InputDialog: Send + Sync {
    fn request_input(&self, prompt: InputPrompt) -> Result<PendingInput, DialogError>;
}

/// Synchronous dialogs: `Some(text)` submits, `None` cancels.
impl<F> InputDialog for F
where
    F: Fn(&InputPrompt) -> Option<String> + Send + Sync,
{
    fn request_input(&self, prompt: InputPrompt) -> Result<PendingInput, DialogError> {
        let (tx, rx) = oneshot::channel();
        if let Some(value) = self(&prompt) {
            // The receiver is still held here, so this cannot fail.
            let _ = tx.send(value);
        }
        Ok(rx)
    }
}

/// A prompt waiting for the presenter's answer.
pub struct DialogRequest {
    pub prompt: InputPrompt,
    responder: oneshot::Sender<String>,
}

impl DialogRequest {
    /// Submit the user's text. Returns `false` if nobody is waiting any more.
    pub fn submit(self, value: impl Into<String>) -> bool {
        self.responder.send(value.into()).is_ok()
    }

    /// Dismiss the dialog without a value.
    pub fn cancel(self) {
        drop(self.responder);
    }
}

impl fmt::Debug for DialogRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogRequest")
            .field("prompt", &self.prompt)
            .finish_non_exhaustive()
    }
}

/// Cloneable handle that forwards prompts to a presenter task.
#[derive(Clone, Debug)]
pub struct DialogHandle {
    request_tx: mpsc::UnboundedSender<DialogRequest>,
}

/// Create a dialog handle and the receiver the presenter reads requests from.
pub fn dialog_channel() -> (DialogHandle, mpsc::UnboundedReceiver<DialogRequest>) {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    (DialogHandle { request_tx }, request_rx)
}

impl InputDialog for DialogHandle {
    fn request_input(&self, prompt: InputPrompt) -> Result<PendingInput, DialogError> {
        let (responder, rx) = oneshot::channel();
        self.request_tx
            .send(DialogRequest { prompt, responder })
            .map_err(|_| DialogError::ChannelClosed)?;
        Ok(rx)
    }
}

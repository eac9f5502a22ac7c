//! User input dialogs.

mod input;

pub use input::{
    dialog_channel, DialogError, DialogHandle, DialogRequest, InputDialog, InputPrompt,
    PendingInput,
};

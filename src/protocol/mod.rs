//! Bluetooth-module text protocol: tokenizer, dispatcher and encoder.

pub mod action;
pub mod dispatcher;
pub mod encoder;
pub mod tokenizer;


pub use action::{Action, Command, ErrorReply, Notification};
pub use dispatcher::{classify, dispatch, Inbound, Remote};
pub use encoder::{encode, encode_into, Outbound};
pub use tokenizer::{tokenize, ParsedMessage};

use crate::context::Context;

/// Tokenize one received line, apply it to `ctx` and return the reply action.
pub fn process_line(ctx: &mut Context, line: &str) -> Action {
    let msg = tokenize(line);
    dispatch(ctx, &msg)
}

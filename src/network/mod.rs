//! Wire-level pieces: the message model, framing, the listener and the sender.

pub mod codec;
pub mod message;
pub mod peer;
pub mod sender;

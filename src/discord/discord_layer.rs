// Discord layer - the message event handler and voice-connection management.

pub mod handler;

pub mod voice;

pub use handler::{Data, Handler};
pub use voice::VoiceManager;

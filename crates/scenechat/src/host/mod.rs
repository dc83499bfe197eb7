//! Host-side implementations of the script executor and audio player.

mod interpreter;
mod player;

pub use interpreter::{InterpreterCommand, ProcessScriptExecutor};
pub use player::CommandAudioPlayer;

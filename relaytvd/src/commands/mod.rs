pub mod channels;
pub mod recordings;
pub mod timers;

pub use channels::{ChannelCommands, PlaylistArgs};
pub use recordings::{RecordingCommands, RecordingDeleteArgs};
pub use timers::{TimerAddArgs, TimerCommands, TimerDeleteArgs};

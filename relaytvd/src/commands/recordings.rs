use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum RecordingCommands {
    /// List recordings, most recent first
    List,
    /// Delete a recording and its file
    Delete(RecordingDeleteArgs),
}

#[derive(Args, Debug)]
pub struct RecordingDeleteArgs {
    pub id: i64,
}

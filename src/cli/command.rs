use std::path::PathBuf;

pub enum Command {
    /// Run the script against the configured MongoDB server.
    Run,
    /// Load the fixture, or `file`, into the configured MongoDB collection.
    Seed { file: Option<PathBuf>, drop: bool },
    /// Seed an in-process engine with the fixture and run the script against it.
    Demo,
}

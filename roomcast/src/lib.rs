/// Audio devices, ring buffer and real-time callbacks
pub mod audio;

/// Configuration file handling
pub mod config;

/// Room transport
pub mod network;

/// Transport bridges and sessions
pub mod pipeline;

/// Per-stream lifecycle state
pub mod stream;

/// Utility modules
pub mod utils;

/// Command-line arguments shared by the binaries
pub mod cli;

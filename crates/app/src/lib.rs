//! Application wiring for the `salin` binary: CLI configuration, shared
//! caption state, the recognition loop, and the terminal UI.

pub mod config;
pub mod display;
pub mod pipeline;
pub mod stt;
pub mod tui;

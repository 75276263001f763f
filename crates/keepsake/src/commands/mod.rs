//! Command handlers for the keepsake CLI.

pub mod history;
pub mod transfer;
pub mod watch;

pub use history::*;
pub use transfer::*;
pub use watch::*;

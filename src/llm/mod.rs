pub mod client;
pub mod drafter;
pub mod extractive;
pub mod prompts;

pub use client::*;
pub use drafter::*;
pub use extractive::*;
pub use prompts::*;

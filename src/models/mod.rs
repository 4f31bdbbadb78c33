pub mod action;
pub mod agenda;
pub mod deepgram;
pub mod minutes;
pub mod segment;
pub mod submission;

pub use action::*;
pub use agenda::*;
pub use deepgram::*;
pub use minutes::*;
pub use segment::*;
pub use submission::*;

pub mod content;
pub mod presence;
pub mod stream;

pub mod balloon;
pub mod content;
pub mod memory;
pub mod stage;
pub mod timer;
pub mod trivia;

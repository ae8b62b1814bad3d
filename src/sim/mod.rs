pub mod controller;
pub mod event;
pub mod progress;
pub mod registry;
pub mod save;
pub mod session;

pub mod config;
pub mod controller;
pub mod hal;
pub mod messages;
pub mod motion;
pub mod protocol;
pub mod runtime;

pub mod audio;
pub mod config;
pub mod controller;
pub mod counts;
pub mod library;
pub mod model;
pub mod monitor;
pub mod queue;
pub mod selection;
pub mod session;
pub mod shell;
pub mod stats;
pub mod sync;
pub mod view;

pub mod command;
pub mod config;
pub mod engine;
pub mod geometry;
pub mod logging;
pub mod pose;
pub mod runtime;
pub mod tracker;

pub mod app;
pub mod cli;
pub mod config;
pub mod docker;
pub mod dockerfile;
pub mod engine;
pub mod history;
pub mod inventory;
pub mod ops;
pub mod ui;

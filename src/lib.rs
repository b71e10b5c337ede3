#![forbid(unsafe_code)]

pub mod app;
pub mod batch;
pub mod catalog;
pub mod commander;
pub mod config;
pub mod device;
pub mod error;
pub mod fs_ops;
pub mod input;
pub mod keys;
pub mod logging;
pub mod menu;
pub mod model;
pub mod pane;
pub mod record;
pub mod ui;
pub mod viewer;

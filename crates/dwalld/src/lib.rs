pub mod alarm;
pub mod apply;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod images;
pub mod interval;
pub mod ipc;
pub mod monitor;
pub mod resolve;
pub mod rules;
pub mod sink;
pub mod state;

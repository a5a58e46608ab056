#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod config;
pub mod geodesy;
pub mod geojson;
pub mod logs;
pub mod main_db;
pub mod route_simulator;
pub mod server;
pub mod storage;
pub mod track;
pub mod track_analyzer;
pub mod utils;

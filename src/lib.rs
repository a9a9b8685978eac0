pub mod api;
pub mod config;
pub mod controller;
pub mod member;
pub mod pdapi;
pub mod telemetry;

//! Terminal front end: tables for rates, histories and the loaded configuration

pub mod config;
pub mod history;
pub mod rates;
pub mod setup;
pub mod ui;

pub mod catalog;
pub mod cli;
pub mod config;
pub mod data_types;
pub mod export;
pub mod repository;
pub mod table;
pub mod validation;

extern crate lazy_static;

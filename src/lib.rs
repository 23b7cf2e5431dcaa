pub mod ai;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod files;
pub mod models;

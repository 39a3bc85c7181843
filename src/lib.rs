pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod favicon;
pub mod handler;
pub mod model;
pub mod query;
pub mod routes;
pub mod store;

pub mod auth;
pub mod clients;
pub mod common;
pub mod configuration;
pub mod observability;
pub mod rate_limiting;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod startup;
pub mod store;

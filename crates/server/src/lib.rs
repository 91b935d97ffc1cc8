//! Backend for the hub: identity, profile documents, usage counters and
//! demo collections over HTTP.

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;

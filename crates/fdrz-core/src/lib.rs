//! Core FDRZ library (session, identity, backend API, config).

pub mod api;
pub mod auth;
pub mod config;
pub mod identity;
pub mod logging;
pub mod session;
pub mod token;

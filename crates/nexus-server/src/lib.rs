//! Nexus HTTP server.
//!
//! Wires the core library and the ownership-scoped store into an Axum API
//! for clients, developers, addresses, projects and infrastructure access
//! records. Every route except registration, login and the health check
//! requires a bearer session token.

pub mod config;
pub mod error;
pub mod extract;
pub mod hardening;
pub mod middleware;
pub mod routes;
pub mod state;

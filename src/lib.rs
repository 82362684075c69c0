//! ContentKosh - content management backend
//!
//! JWT authentication with role-based access control, content items with
//! comments and likes, and a client session helper.

pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod models;
pub mod services;

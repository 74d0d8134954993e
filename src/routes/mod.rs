/**
 * Routes Module
 * API route handlers
 */

pub mod alerts;
pub mod analytics;
pub mod auth;
pub mod directory;
pub mod health;
pub mod pages;
pub mod resources;
pub mod users;
pub mod weather;

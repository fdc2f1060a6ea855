//! Watch storefront: catalog, auth and order API plus the client-side storefront core
//! (cart state machine, checkout flow, admin catalog editor).

pub mod app;
pub mod audit;
pub mod config;
pub mod db;
pub mod dto;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod storefront;

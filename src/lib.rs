//! Backend for a music studio site: lesson booking with hourly slot
//! availability, an appointment and payment lifecycle, editable site
//! content and the public catalog, all persisted through a
//! [`store::RecordStore`].

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod provision;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

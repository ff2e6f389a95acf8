//! Resume CRUD, preview and PDF download.

pub mod handlers;
pub mod repository;
pub mod validation;

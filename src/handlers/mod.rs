//! Request handlers. `factory` holds the CRUD operations every model shares;
//! the per-resource modules add what is specific to one resource.

pub mod factory;
pub mod reviews;
pub mod system;
pub mod tours;
pub mod users;

//! API request handlers, one module per resource.

pub mod auth;
pub mod doctors;
pub mod insurers;
pub mod login;
pub mod orders;
pub mod patients;
pub mod persons;
pub mod specialties;
pub mod users;

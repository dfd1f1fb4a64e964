//! Repository implementations for CRUD operations, one per aggregate.

pub mod doctors;
pub mod insurers;
pub mod orders;
pub mod patients;
pub mod persons;
pub mod repository;
pub mod specialties;
pub mod users;

pub use doctors::Doctors;
pub use insurers::Insurers;
pub use orders::{OrderLines, Orders};
pub use patients::Patients;
pub use persons::Persons;
pub use repository::Repository;
pub use specialties::Specialties;
pub use users::Users;

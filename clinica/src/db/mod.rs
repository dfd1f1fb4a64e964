//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL.
//! It follows the Repository pattern to provide clean abstractions over
//! database operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries & write rules)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Repository Pattern
//!
//! The [`handlers`] module provides one repository per aggregate. Repositories
//! borrow a `&mut PgConnection`, so the caller decides the transaction scope:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let mut repo = Persons::new(&mut tx);
//! let person = repo.create(&create_request).await?;
//! tx.commit().await?;
//! ```
//!
//! # Optimistic concurrency
//!
//! Every table carries a `version` column. Updates are compare-and-set
//! (`WHERE id = $1 AND version = $2`); a write that loses the race surfaces
//! as [`errors::DbError::VersionConflict`] instead of silently overwriting.
//!
//! # Migrations
//!
//! Database migrations are managed by SQLx and located in the `migrations/`
//! directory. The [`crate::migrator`] function provides access to the migrator.

pub mod errors;
pub mod handlers;
pub mod models;

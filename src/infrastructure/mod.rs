//! Persistence: pool, row types and sqlx repositories.

pub mod database;
pub mod entities;
pub mod repositories;
pub mod traits;

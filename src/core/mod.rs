//! Business logic, independent of HTTP and SQL.

pub mod assistant;
pub mod completion;
pub mod ordering;
pub mod services;
pub mod traits;

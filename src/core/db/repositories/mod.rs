//! Database repositories
//!
//! Repositories encapsulate data access logic and provide a clean API for
//! business logic to interact with storage.

pub mod memory;
pub mod user;

pub use memory::MemoryUserStore;
pub use user::{UserRepository, UserRepositoryError, UserStore};

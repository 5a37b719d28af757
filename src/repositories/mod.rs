pub mod account;
pub mod memory;

pub use account::{AccountStore, PgAccountStore};
pub use memory::MemoryAccountStore;

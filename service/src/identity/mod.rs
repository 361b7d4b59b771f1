//! Accounts, roles and request actors.

pub mod http;
pub mod repo;
pub mod role;

pub use repo::{Account, AccountRepo, AccountRepoError, PgAccountRepo};
pub use role::Role;

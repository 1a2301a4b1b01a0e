//! In-process implementations of the storage ports. Backs the `memory`
//! storage backend and the test suites.

mod identity_repo_memory;
mod manual_clock;
mod refresh_token_repo_memory;
mod revocation_store_memory;

pub use identity_repo_memory::*;
pub use manual_clock::*;
pub use refresh_token_repo_memory::*;
pub use revocation_store_memory::*;

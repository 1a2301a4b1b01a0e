mod clock;
mod revocation_store;

pub use clock::*;
pub use revocation_store::*;

// repo

mod identity_repo;
mod refresh_token_repo;

pub use identity_repo::*;
pub use refresh_token_repo::*;

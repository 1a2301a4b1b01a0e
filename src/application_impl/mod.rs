mod access_guard_impl;
mod argon2_hasher;
mod auth_service_impl;
mod deadline;
mod deferred_revoker;
pub(crate) mod jwt_codec;
mod refresh_ledger;
mod revocation_registry;

pub use access_guard_impl::*;
pub use argon2_hasher::*;
pub use auth_service_impl::*;
pub use deadline::*;
pub use deferred_revoker::*;
pub use jwt_codec::*;
pub use refresh_ledger::*;
pub use revocation_registry::*;

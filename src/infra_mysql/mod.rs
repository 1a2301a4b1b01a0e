mod identity_repo_mysql;
mod refresh_token_repo_mysql;

pub use identity_repo_mysql::*;
pub use refresh_token_repo_mysql::*;

mod util;

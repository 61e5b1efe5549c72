// store

mod token_store;

pub use token_store::*;

// repo

mod user_repo;

pub use user_repo::*;

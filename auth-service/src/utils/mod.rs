pub mod password;
pub mod validation;

pub use password::{hash_password, hash_secret_digest, verify_password, Password};
pub use validation::{ValidatedJson, ValidatedQuery};

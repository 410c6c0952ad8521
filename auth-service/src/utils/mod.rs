pub mod password;
pub mod validation;

pub use password::{hash_secret, secret_matches, verify_secret, Secret, SecretHash};
pub use validation::ValidatedJson;

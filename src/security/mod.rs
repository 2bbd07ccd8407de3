//! Security module for qserv.
//!
//! - **Passwords**: Argon2 hashing for new accounts, with verification of
//!   bcrypt hashes carried over from older account files.

pub mod password;

pub use password::{PasswordError, hash_password, verify_password};

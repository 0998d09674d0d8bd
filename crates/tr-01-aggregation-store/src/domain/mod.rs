//! Store domain: errors and bucket policy.

pub mod errors;
pub mod policy;

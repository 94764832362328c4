//! Integration tests for bucketsync-store
//!
//! Uses wiremock to simulate an S3-compatible endpoint and verifies the
//! request shapes and error classification of `S3Session`.

mod common;

mod test_s3_errors;
mod test_s3_objects;

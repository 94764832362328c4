//! Error classification of S3 responses

use bucketsync_core::ports::remote_store::{IRemoteStore, StoreError};
use bucketsync_store::S3Session;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, bucket, key, BUCKET};

#[tokio::test]
async fn test_connect_rejected_credentials_is_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string(common::error_xml("InvalidAccessKeyId", "bad key")),
        )
        .mount(&server)
        .await;

    let result = S3Session::connect(&common::store_config(&server)).await;
    assert!(matches!(result, Err(StoreError::Unauthorized(_))));
}

#[tokio::test]
async fn test_missing_bucket_listing_is_bucket_not_found() {
    let (server, session) = common::setup_s3_mock().await;

    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_string(common::error_xml("NoSuchBucket", "gone")),
        )
        .mount(&server)
        .await;

    let err = session.list_objects(&bucket()).await.unwrap_err();
    assert!(matches!(err, StoreError::BucketNotFound(ref b) if b == BUCKET));
}

#[tokio::test]
async fn test_forbidden_head_is_unauthorized() {
    let (server, session) = common::setup_s3_mock().await;

    Mock::given(method("HEAD"))
        .and(path(format!("/{BUCKET}/secret.txt")))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = session
        .get_object(&bucket(), &key("secret.txt"))
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn test_delete_access_denied_is_unauthorized() {
    let (server, session) = common::setup_s3_mock().await;

    Mock::given(method("DELETE"))
        .and(path(format!("/{BUCKET}/locked.txt")))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string(common::error_xml("AccessDenied", "Access Denied")),
        )
        .mount(&server)
        .await;

    let err = session
        .delete_object(&bucket(), &key("locked.txt"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unauthorized(_)));
}

#[tokio::test]
async fn test_upload_of_missing_local_file_is_io_error() {
    let (_server, session) = common::setup_s3_mock().await;

    let err = session
        .put_object(
            &bucket(),
            &key("a.txt"),
            std::path::Path::new("/nonexistent/bucketsync/a.txt"),
            &Default::default(),
            Default::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Io(_)));
}

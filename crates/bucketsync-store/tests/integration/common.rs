//! Shared test helpers for S3 integration tests
//!
//! Provides a wiremock server that answers like an S3-compatible service
//! with path-style addressing, plus XML fixtures for the common responses.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bucketsync_core::config::StoreConfig;
use bucketsync_core::domain::newtypes::{BucketName, ObjectKey};
use bucketsync_store::S3Session;

pub const BUCKET: &str = "test-bucket";

pub fn bucket() -> BucketName {
    BucketName::new(BUCKET.to_string()).unwrap()
}

pub fn key(s: &str) -> ObjectKey {
    ObjectKey::new(s.to_string()).unwrap()
}

/// Store config pointing at the mock server with static test credentials
pub fn store_config(server: &MockServer) -> StoreConfig {
    StoreConfig {
        access_key: Some("AKIDTEST".to_string()),
        secret_key: Some("secret-test".to_string()),
        region: "us-east-1".to_string(),
        endpoint_url: Some(server.uri()),
    }
}

/// `ListAllMyBucketsResult` body for the given names
pub fn list_buckets_xml(names: &[&str]) -> String {
    let buckets: String = names
        .iter()
        .map(|n| {
            format!(
                "<Bucket><Name>{n}</Name><CreationDate>2024-01-01T00:00:00.000Z</CreationDate></Bucket>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ListAllMyBucketsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Owner><ID>owner-id</ID><DisplayName>owner</DisplayName></Owner>
  <Buckets>{buckets}</Buckets>
</ListAllMyBucketsResult>"#
    )
}

/// One `<Contents>` entry of a ListObjectsV2 page
pub fn contents_xml(key: &str, etag: &str, size: u64) -> String {
    format!(
        "<Contents><Key>{key}</Key><LastModified>2024-05-01T10:00:00.000Z</LastModified>\
         <ETag>&quot;{etag}&quot;</ETag><Size>{size}</Size><StorageClass>STANDARD</StorageClass></Contents>"
    )
}

/// A ListObjectsV2 page; `next` marks the page as truncated
pub fn list_objects_xml(contents: &[String], next: Option<&str>) -> String {
    let truncated = match next {
        Some(token) => format!(
            "<IsTruncated>true</IsTruncated><NextContinuationToken>{token}</NextContinuationToken>"
        ),
        None => "<IsTruncated>false</IsTruncated>".to_string(),
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>{BUCKET}</Name><Prefix></Prefix><KeyCount>{}</KeyCount><MaxKeys>1000</MaxKeys>
  {truncated}
  {}
</ListBucketResult>"#,
        contents.len(),
        contents.join("")
    )
}

/// S3 `<Error>` body
pub fn error_xml(code: &str, message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>{code}</Code><Message>{message}</Message><RequestId>req-1</RequestId></Error>"#
    )
}

/// Starts a mock server that accepts the credential check and returns a connected session
pub async fn setup_s3_mock() -> (MockServer, S3Session) {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(list_buckets_xml(&["beta-bucket", BUCKET, "alpha-bucket"]))
                .insert_header("content-type", "application/xml"),
        )
        .mount(&server)
        .await;

    let session = S3Session::connect(&store_config(&server))
        .await
        .expect("connect to mock S3");

    (server, session)
}

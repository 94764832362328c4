//! Object operations against a mock S3 endpoint
//!
//! Verifies listing (with pagination), metadata fetches, uploads,
//! metadata-only rewrites, deletes and downloads.

use bucketsync_core::domain::objects::{ObjectMetadata, MTIME_METADATA_KEY};
use bucketsync_core::ports::remote_store::{IRemoteStore, Visibility};
use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, bucket, key, BUCKET};

const MD5_A: &str = "0cc175b9c0f1b6a831c399e269772661";
const MD5_B: &str = "92eb5ffee6ae2fec3ad71c777531578f";

// ============================================================================
// Buckets
// ============================================================================

#[tokio::test]
async fn test_list_buckets_sorted() {
    let (_server, session) = common::setup_s3_mock().await;

    let names = session.list_buckets().await.expect("list buckets");
    assert_eq!(names, vec!["alpha-bucket", "beta-bucket", BUCKET]);
}

#[tokio::test]
async fn test_bucket_exists() {
    let (server, session) = common::setup_s3_mock().await;

    Mock::given(method("HEAD"))
        .and(path(format!("/{BUCKET}")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/missing-bucket"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(session.bucket_exists(&bucket()).await.unwrap());
    let missing = bucketsync_core::domain::newtypes::BucketName::new("missing-bucket".into()).unwrap();
    assert!(!session.bucket_exists(&missing).await.unwrap());
}

#[tokio::test]
async fn test_bucket_location() {
    let (server, session) = common::setup_s3_mock().await;

    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .and(query_param_is_missing("list-type"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<LocationConstraint xmlns="http://s3.amazonaws.com/doc/2006-03-01/">eu-west-1</LocationConstraint>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/legacy-bucket"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<LocationConstraint xmlns="http://s3.amazonaws.com/doc/2006-03-01/"/>"#,
        ))
        .mount(&server)
        .await;

    assert_eq!(session.bucket_location(&bucket()).await.unwrap(), "eu-west-1");
    let legacy = bucketsync_core::domain::newtypes::BucketName::new("legacy-bucket".into()).unwrap();
    assert_eq!(session.bucket_location(&legacy).await.unwrap(), "us-east-1");
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_objects_follows_continuation_tokens() {
    let (server, session) = common::setup_s3_mock().await;

    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .and(query_param("list-type", "2"))
        .and(query_param_is_missing("continuation-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::list_objects_xml(
            &[common::contents_xml("a.txt", MD5_A, 1)],
            Some("page-2"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}")))
        .and(query_param("list-type", "2"))
        .and(query_param("continuation-token", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(common::list_objects_xml(
            &[common::contents_xml("dir/b.txt", MD5_B, 1)],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let objects = session.list_objects(&bucket()).await.expect("list objects");

    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0].key, key("a.txt"));
    assert_eq!(objects[0].fingerprint.as_str(), MD5_A);
    assert_eq!(objects[0].size, 1);
    assert_eq!(
        objects[0].last_modified,
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    );
    assert_eq!(objects[1].key, key("dir/b.txt"));
}

// ============================================================================
// Metadata
// ============================================================================

#[tokio::test]
async fn test_get_object_reads_user_metadata() {
    let (server, session) = common::setup_s3_mock().await;

    Mock::given(method("HEAD"))
        .and(path(format!("/{BUCKET}/a.txt")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", format!("\"{MD5_A}\"").as_str())
                .insert_header("Last-Modified", "Wed, 01 May 2024 10:00:00 GMT")
                .insert_header("x-amz-meta-mtime", "2024-04-30T08:00:00Z"),
        )
        .mount(&server)
        .await;

    let obj = session
        .get_object(&bucket(), &key("a.txt"))
        .await
        .expect("head object")
        .expect("object exists");

    assert_eq!(obj.fingerprint.as_str(), MD5_A);
    assert_eq!(
        obj.stored_mtime(),
        Some(Utc.with_ymd_and_hms(2024, 4, 30, 8, 0, 0).unwrap())
    );
    assert_eq!(
        obj.last_modified,
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_get_object_missing_is_none() {
    let (server, session) = common::setup_s3_mock().await;

    Mock::given(method("HEAD"))
        .and(path(format!("/{BUCKET}/nope.txt")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = session.get_object(&bucket(), &key("nope.txt")).await;
    assert!(matches!(result, Ok(None)));
}

// ============================================================================
// Mutations
// ============================================================================

#[tokio::test]
async fn test_put_object_sends_metadata_and_acl() {
    let (server, session) = common::setup_s3_mock().await;

    Mock::given(method("PUT"))
        .and(path(format!("/{BUCKET}/backups/a.txt")))
        .and(header("x-amz-meta-mtime", "2024-05-01T10:00:00Z"))
        .and(header("x-amz-acl", "public-read"))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", format!("\"{MD5_A}\"").as_str()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let local = dir.path().join("a.txt");
    std::fs::write(&local, b"a").unwrap();

    let mut metadata = ObjectMetadata::new();
    metadata.insert(MTIME_METADATA_KEY.to_string(), "2024-05-01T10:00:00Z".to_string());

    session
        .put_object(&bucket(), &key("backups/a.txt"), &local, &metadata, Visibility::PublicRead)
        .await
        .expect("put object");
}

#[tokio::test]
async fn test_update_metadata_copies_onto_itself() {
    let (server, session) = common::setup_s3_mock().await;

    Mock::given(method("PUT"))
        .and(path(format!("/{BUCKET}/a%20b.txt")))
        .and(header("x-amz-copy-source", format!("{BUCKET}/a%20b.txt").as_str()))
        .and(header("x-amz-metadata-directive", "REPLACE"))
        .and(header("x-amz-meta-mtime", "2024-05-02T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<CopyObjectResult><LastModified>2024-05-02T00:00:01.000Z</LastModified><ETag>&quot;{MD5_A}&quot;</ETag></CopyObjectResult>"#
        )))
        .expect(1)
        .mount(&server)
        .await;

    let mut metadata = ObjectMetadata::new();
    metadata.insert(MTIME_METADATA_KEY.to_string(), "2024-05-02T00:00:00Z".to_string());

    session
        .update_metadata(&bucket(), &key("a b.txt"), &metadata, Visibility::Private)
        .await
        .expect("copy object");
}

#[tokio::test]
async fn test_delete_object() {
    let (server, session) = common::setup_s3_mock().await;

    Mock::given(method("DELETE"))
        .and(path(format!("/{BUCKET}/old.sql")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    session
        .delete_object(&bucket(), &key("old.sql"))
        .await
        .expect("delete object");
}

#[tokio::test]
async fn test_download_object_writes_nested_file() {
    let (server, session) = common::setup_s3_mock().await;

    let content: Vec<u8> = (0..65_536).map(|i| (i % 251) as u8).collect();
    Mock::given(method("GET"))
        .and(path(format!("/{BUCKET}/deep/dir/blob.bin")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.clone())
                .insert_header("content-type", "application/octet-stream"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("deep/dir/blob.bin");

    session
        .download_object(&bucket(), &key("deep/dir/blob.bin"), &dest)
        .await
        .expect("download object");

    assert_eq!(std::fs::read(&dest).unwrap(), content);
}

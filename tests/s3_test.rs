use std::fs;

use httpmock::prelude::*;
use storage_initializer::{Storage, StorageConfig, StorageError};

fn list_xml(keys: &[&str], next_token: Option<&str>) -> String {
    let contents: String = keys
        .iter()
        .map(|key| {
            format!(
                "<Contents><Key>{key}</Key>\
                 <LastModified>2024-01-01T00:00:00.000Z</LastModified>\
                 <ETag>&quot;d41d8cd98f00b204e9800998ecf8427e&quot;</ETag>\
                 <Size>5</Size><StorageClass>STANDARD</StorageClass></Contents>"
            )
        })
        .collect();
    let truncation = match next_token {
        Some(token) => format!(
            "<IsTruncated>true</IsTruncated>\
             <NextContinuationToken>{token}</NextContinuationToken>"
        ),
        None => "<IsTruncated>false</IsTruncated>".to_owned(),
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>bucket</Name><Prefix></Prefix><KeyCount>{}</KeyCount><MaxKeys>1000</MaxKeys>{truncation}{contents}</ListBucketResult>"#,
        keys.len()
    )
}

fn config(server: &MockServer, with_keys: bool) -> StorageConfig {
    let mut config = StorageConfig::default();
    config.s3.endpoint = Some(server.base_url());
    config.s3.secure = false;
    config.s3.region = Some("us-east-1".to_owned());
    if with_keys {
        config.s3.access_key = Some("test-access".to_owned());
        config.s3.secret_key = Some("test-secret".to_owned());
    }
    config
}

fn mock_object(server: &MockServer, key: &str, body: &'static str) {
    let path = format!("/bucket/{key}");
    server.mock(|when, then| {
        when.method(GET).path(path);
        then.status(200)
            .header("content-type", "application/octet-stream")
            .body(body);
    });
}

#[test]
fn downloads_bucket_root_and_skips_markers() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
        when.method(GET)
            .path("/bucket")
            .query_param("list-type", "2");
        then.status(200)
            .header("content-type", "application/xml")
            .body(list_xml(&["dir/", "dir/model.pkl"], None));
    });
    mock_object(&server, "dir/model.pkl", "model");
    let out = tempfile::tempdir().unwrap();

    let res = Storage::new(config(&server, true))
        .download("s3://bucket/", Some(out.path()))
        .unwrap();

    list.assert();
    assert_eq!(res, out.path());
    assert_eq!(fs::read(out.path().join("dir/model.pkl")).unwrap(), b"model");
    assert_eq!(fs::read_dir(out.path().join("dir")).unwrap().count(), 1);
}

#[test]
fn follows_continuation_tokens() {
    let server = MockServer::start();
    // Mocks are matched in the order they are defined.
    let second = server.mock(|when, then| {
        when.method(GET)
            .path("/bucket")
            .query_param("continuation-token", "page-2");
        then.status(200)
            .header("content-type", "application/xml")
            .body(list_xml(&["models/b.bin"], None));
    });
    let first = server.mock(|when, then| {
        when.method(GET)
            .path("/bucket")
            .query_param("list-type", "2");
        then.status(200)
            .header("content-type", "application/xml")
            .body(list_xml(&["models/a.bin"], Some("page-2")));
    });
    mock_object(&server, "models/a.bin", "first");
    mock_object(&server, "models/b.bin", "second");
    let out = tempfile::tempdir().unwrap();

    Storage::new(config(&server, true))
        .download("s3://bucket/models", Some(out.path()))
        .unwrap();

    first.assert_hits(1);
    second.assert_hits(1);
    assert_eq!(fs::read(out.path().join("a.bin")).unwrap(), b"first");
    assert_eq!(fs::read(out.path().join("b.bin")).unwrap(), b"second");
}

#[test]
fn retries_anonymously_without_explicit_keys() {
    let server = MockServer::start();
    let signed = server.mock(|when, then| {
        when.method(GET).path("/bucket").header_exists("authorization");
        then.status(403)
            .header("content-type", "application/xml")
            .body("<Error><Code>AccessDenied</Code><Message>denied</Message></Error>");
    });
    let anonymous = server.mock(|when, then| {
        when.method(GET).path("/bucket");
        then.status(200)
            .header("content-type", "application/xml")
            .body(list_xml(&["model.pkl"], None));
    });
    mock_object(&server, "model.pkl", "model");
    let out = tempfile::tempdir().unwrap();

    Storage::new(config(&server, false))
        .download("s3://bucket/model.pkl", Some(out.path()))
        .unwrap();

    anonymous.assert_hits(1);
    assert!(signed.hits() <= 1);
    assert_eq!(fs::read(out.path().join("model.pkl")).unwrap(), b"model");
}

#[test]
fn explicit_keys_are_not_retried_anonymously() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/bucket").header_exists("authorization");
        then.status(403)
            .header("content-type", "application/xml")
            .body("<Error><Code>AccessDenied</Code><Message>denied</Message></Error>");
    });
    let anonymous = server.mock(|when, then| {
        when.method(GET).path("/bucket");
        then.status(200)
            .header("content-type", "application/xml")
            .body(list_xml(&["model.pkl"], None));
    });
    let out = tempfile::tempdir().unwrap();

    let err = Storage::new(config(&server, true))
        .download("s3://bucket/model.pkl", Some(out.path()))
        .unwrap_err();

    assert!(matches!(err, StorageError::Backend { backend: "S3", .. }));
    anonymous.assert_hits(0);
}

#[test]
fn empty_listing_is_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/bucket");
        then.status(200)
            .header("content-type", "application/xml")
            .body(list_xml(&[], None));
    });
    let out = tempfile::tempdir().unwrap();

    let err = Storage::new(config(&server, true))
        .download("s3://bucket/missing", Some(out.path()))
        .unwrap_err();

    assert!(matches!(err, StorageError::ArtifactNotFound { .. }));
}

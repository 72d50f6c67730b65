// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ji_core::BrokerKind;
use std::io::Write;

fn secure(ca: Option<&str>) -> BrokerConnectionConfig {
    BrokerConnectionConfig::new(BrokerKind::Topic, "nats", 4222)
        .secure(true)
        .ca_file(ca.map(PathBuf::from))
}

fn zip_of(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in files {
        writer.start_file(*name, zip::write::FileOptions::default()).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn insecure_connection_needs_no_material() {
    let fetcher = TlsFetcher::new("/tmp", None, "app", "secret");
    let plain = BrokerConnectionConfig::new(BrokerKind::Topic, "nats", 4222);
    assert_eq!(fetcher.ensure(&plain).await.unwrap(), None);
}

#[tokio::test]
async fn secure_without_ca_path_is_fatal() {
    let fetcher = TlsFetcher::new("/tmp", None, "app", "secret");
    let err = fetcher.ensure(&secure(None)).await.unwrap_err();
    assert!(matches!(err, TlsError::MissingCaFile));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn missing_ca_without_end_point_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = TlsFetcher::new(dir.path(), None, "app", "secret");
    let err = fetcher.ensure(&secure(Some("certs/ca.pem"))).await.unwrap_err();
    assert!(matches!(err, TlsError::CaNotFound(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn existing_ca_resolves_relative_to_base_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("certs")).unwrap();
    std::fs::write(dir.path().join("certs/ca.pem"), "pem").unwrap();
    let fetcher = TlsFetcher::new(dir.path(), None, "app", "secret");

    let material = fetcher.ensure(&secure(Some("certs/ca.pem"))).await.unwrap().unwrap();

    assert_eq!(material.ca_file, dir.path().join("certs/ca.pem"));
    assert_eq!(material.read_ca().unwrap(), b"pem");
    assert!(material.client_identity().is_none());
}

#[test]
fn plain_bundle_is_written_as_ca_file() {
    let dir = tempfile::tempdir().unwrap();
    let ca = dir.path().join("tls/ca.pem");
    install_bundle(b"-----BEGIN CERTIFICATE-----", &ca).unwrap();
    assert_eq!(std::fs::read_to_string(&ca).unwrap(), "-----BEGIN CERTIFICATE-----");
}

#[test]
fn zip_bundle_is_unpacked_next_to_ca_file() {
    let dir = tempfile::tempdir().unwrap();
    let ca = dir.path().join("ca.pem");
    let bundle = zip_of(&[("ca.pem", "ca"), ("client.pem", "cert"), ("client.key", "key")]);

    install_bundle(&bundle, &ca).unwrap();

    assert_eq!(std::fs::read_to_string(dir.path().join("ca.pem")).unwrap(), "ca");
    assert_eq!(std::fs::read_to_string(dir.path().join("client.key")).unwrap(), "key");
}

#[test]
fn zip_entries_escaping_the_directory_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let inner = dir.path().join("inner");
    let bundle = zip_of(&[("../evil.pem", "x"), ("ca.pem", "ca")]);

    install_bundle(&bundle, &inner.join("ca.pem")).unwrap();

    assert!(!dir.path().join("evil.pem").exists());
    assert!(inner.join("ca.pem").exists());
}

// SPDX-License-Identifier: MIT

use super::*;
use tempfile::TempDir;

fn workspace() -> (LocalWorkspace, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    (LocalWorkspace::new(dir.path()), dir)
}

#[tokio::test]
async fn write_then_read_round_trips() {
    let (ws, _dir) = workspace();
    ws.write_text_file("notes/a.txt", "hello").await.expect("write");
    assert_eq!(ws.read_text_file("notes/a.txt").await.expect("read"), "hello");
}

#[tokio::test]
async fn write_creates_missing_parent_directories() {
    let (ws, dir) = workspace();
    ws.write_text_file("a/b/c.txt", "x").await.expect("write");
    assert!(dir.path().join("a/b/c.txt").exists());
}

#[tokio::test]
async fn ensure_text_file_does_not_overwrite_existing_content() {
    let (ws, _dir) = workspace();
    ws.write_text_file("a.txt", "original").await.expect("write");
    ws.ensure_text_file("a.txt", "replacement").await.expect("ensure");
    assert_eq!(ws.read_text_file("a.txt").await.expect("read"), "original");
}

#[tokio::test]
async fn ensure_text_file_creates_when_absent() {
    let (ws, _dir) = workspace();
    ws.ensure_text_file("a.txt", "seed").await.expect("ensure");
    assert_eq!(ws.read_text_file("a.txt").await.expect("read"), "seed");
}

#[tokio::test]
async fn remove_path_deletes_a_file() {
    let (ws, _dir) = workspace();
    ws.write_text_file("a.txt", "x").await.expect("write");
    ws.remove_path("a.txt").await.expect("remove");
    assert!(!ws.exists("a.txt").await);
}

#[tokio::test]
async fn remove_path_on_missing_file_is_not_an_error() {
    let (ws, _dir) = workspace();
    ws.remove_path("missing.txt").await.expect("remove is a no-op");
}

#[tokio::test]
async fn absolute_path_escapes_the_root() {
    let (ws, _dir) = workspace();
    let err = ws.write_text_file("/etc/passwd", "x").await.unwrap_err();
    assert!(matches!(err, WorkspaceError::PathEscape(_)));
}

#[tokio::test]
async fn parent_dir_component_escapes_the_root() {
    let (ws, _dir) = workspace();
    let err = ws.write_text_file("../escape.txt", "x").await.unwrap_err();
    assert!(matches!(err, WorkspaceError::PathEscape(_)));
}

#[tokio::test]
async fn exists_is_false_for_an_escaping_path_rather_than_panicking() {
    let (ws, _dir) = workspace();
    assert!(!ws.exists("../escape.txt").await);
}

#[tokio::test]
async fn read_text_file_on_missing_path_is_an_io_error() {
    let (ws, _dir) = workspace();
    let err = ws.read_text_file("missing.txt").await.unwrap_err();
    assert!(matches!(err, WorkspaceError::Io(_)));
}

// SPDX-License-Identifier: MIT

use super::*;
use tempfile::tempdir;

#[test]
fn missing_base_dir_returns_empty() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("does-not-exist");
    assert_eq!(collect_workflow_files(&missing).expect("ok"), Vec::<PathBuf>::new());
}

#[test]
fn collects_nested_workflow_files_sorted() {
    let dir = tempdir().expect("tempdir");
    let proj_a = dir.path().join("proj-a");
    let proj_b = dir.path().join("proj-b");
    std::fs::create_dir_all(&proj_a).expect("mkdir");
    std::fs::create_dir_all(&proj_b).expect("mkdir");
    std::fs::write(proj_a.join("workflow.yaml"), "id: a\n").expect("write");
    std::fs::write(proj_b.join("workflow.yaml"), "id: b\n").expect("write");
    std::fs::write(dir.path().join("notes.txt"), "ignore me").expect("write");

    let found = collect_workflow_files(dir.path()).expect("ok");
    assert_eq!(found.len(), 2);
    assert!(found[0] < found[1]);
}

use assert_cmd::prelude::*;
use predicates::str::contains;
use std::process::Command;

#[test]
fn mesh_info_reports_counts_for_two_band_sphere() {
    let mut cmd = Command::cargo_bin("sphere-viewer").expect("binary exists");
    cmd.args(["--mesh-info", "--bands", "2", "2"]);
    cmd.assert()
        .success()
        .stdout(contains("9 vertices"))
        .stdout(contains("8 triangles"))
        .stdout(contains("24 indices"));
}

#[test]
fn mesh_info_uses_default_resolution() {
    let mut cmd = Command::cargo_bin("sphere-viewer").expect("binary exists");
    cmd.arg("--mesh-info");
    // 31 * 31 vertices, 2 * 30 * 30 triangles.
    cmd.assert()
        .success()
        .stdout(contains("961 vertices"))
        .stdout(contains("1800 triangles"));
}

#[test]
fn invalid_radius_is_rejected_before_generation() {
    let mut cmd = Command::cargo_bin("sphere-viewer").expect("binary exists");
    cmd.args(["--mesh-info", "--radius", "0"]);
    cmd.assert()
        .failure()
        .stderr(contains("radius must be positive"));
}

#[test]
fn zero_band_count_is_rejected() {
    let mut cmd = Command::cargo_bin("sphere-viewer").expect("binary exists");
    cmd.args(["--mesh-info", "--bands", "0", "8"]);
    cmd.assert()
        .failure()
        .stderr(contains("band counts must be at least 1"));
}

#[test]
fn unknown_arguments_print_usage() {
    let mut cmd = Command::cargo_bin("sphere-viewer").expect("binary exists");
    cmd.arg("--wireframe");
    cmd.assert().failure().stderr(contains("Usage"));
}

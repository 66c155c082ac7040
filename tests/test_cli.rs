
use fixtures::*;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn it_converts_every_log_under_root() {
    let d = tempdir().unwrap();
    copy_sample(&regular_sample(), d.path(), "application.log");
    copy_sample(&regular_sample(), d.path(), "nested/dir/SYSTEM.LOG");

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evtxt_dump"));
    cmd.arg(d.path());

    cmd.assert().success().stdout(predicate::str::is_empty());

    for output in [
        d.path().join("application_result.txt"),
        d.path().join("nested/dir/SYSTEM_result.txt"),
    ] {
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            regular_sample_expected_output(),
            "unexpected content in {}",
            output.display()
        );
    }
}

#[test]
fn it_defaults_to_current_directory() {
    let d = tempdir().unwrap();
    copy_sample(&regular_sample(), d.path(), "application.log");

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evtxt_dump"));
    cmd.current_dir(d.path());

    cmd.assert().success();
    assert!(d.path().join("application_result.txt").is_file());
}

#[test]
fn it_reports_when_no_logs_are_found() {
    let d = tempdir().unwrap();
    fs::write(d.path().join("readme.txt"), "nothing to see").unwrap();

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evtxt_dump"));
    cmd.arg(d.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("no .log file found"));
}

#[test]
fn it_keeps_going_after_a_broken_file() {
    let d = tempdir().unwrap();
    copy_sample(&sample_with_a_malformed_line(), d.path(), "a_broken.log");
    copy_sample(&regular_sample(), d.path(), "b_application.log");

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evtxt_dump"));
    cmd.arg(d.path());

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("a_broken.log"))
        .stderr(predicate::str::contains("1 file(s) failed to convert"));

    assert_eq!(
        fs::read_to_string(d.path().join("b_application_result.txt")).unwrap(),
        regular_sample_expected_output()
    );
}

#[test]
fn it_resyncs_on_malformed_lines_when_asked() {
    let d = tempdir().unwrap();
    copy_sample(&sample_with_a_malformed_line(), d.path(), "broken.log");

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evtxt_dump"));
    cmd.args(["--resync-on-malformed", &d.path().to_string_lossy()]);

    cmd.assert().success();
    assert_eq!(
        fs::read_to_string(d.path().join("broken_result.txt"))
            .unwrap()
            .lines()
            .count(),
        2
    );
}

#[test]
fn it_respects_output_dir_and_postfix() {
    let d = tempdir().unwrap();
    let input_dir = d.path().join("input");
    let output_dir = d.path().join("output");
    copy_sample(&regular_sample(), &input_dir, "application.log");

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evtxt_dump"));
    cmd.args([
        "-o",
        &output_dir.to_string_lossy(),
        "--postfix",
        "_json",
        &input_dir.to_string_lossy(),
    ]);

    cmd.assert().success();
    assert!(output_dir.join("application_json.txt").is_file());
    assert!(!input_dir.join("application_result.txt").exists());
}

#[test]
fn it_writes_to_stdout_when_asked() {
    let d = tempdir().unwrap();
    copy_sample(&regular_sample(), d.path(), "application.log");

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evtxt_dump"));
    cmd.args(["--stdout", &d.path().to_string_lossy()]);

    let output = cmd.output().unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        regular_sample_expected_output()
    );
    assert!(!d.path().join("application_result.txt").exists());
}

#[test]
fn it_names_the_file_that_could_not_be_read() {
    let d = tempdir().unwrap();
    fs::write(
        d.path().join("latin1.log"),
        b"Event number: 1\nSource: Gr\xf6\xdfe\nNumber of strings: 0\n",
    )
    .unwrap();
    copy_sample(&regular_sample(), d.path(), "utf8.log");

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evtxt_dump"));
    cmd.arg(d.path());

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("latin1.log"))
        .stderr(predicate::str::contains("line 2"));

    assert!(d.path().join("utf8_result.txt").is_file());
}

#[path = "common/mod.rs"]
mod common;

use std::fs;

use common::TestEnv;
use predicates::prelude::*;

#[test]
fn status_reports_every_service_when_nothing_runs() {
    let env = TestEnv::new();
    let ng_home = env.dir().join("ng");
    fs::create_dir_all(&ng_home).unwrap();

    let output = env
        .command(&ng_home)
        .arg("status")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 8, "unexpected output: {stdout}");
    assert!(lines.iter().all(|line| line.ends_with("NOT Running")));
    assert_eq!(lines[0], "Status of activemq service: NOT Running");
    assert!(stdout.contains("Status of scheduler service: NOT Running"));
}

#[test]
fn status_of_one_service() {
    let env = TestEnv::new();
    let ng_home = env.dir().join("ng");

    env.command(&ng_home)
        .args(["status", "tomcat"])
        .assert()
        .success()
        .stdout("Status of tomcat service: NOT Running\n");
}

#[test]
fn status_all_flag_wins_over_service_name() {
    let env = TestEnv::new();
    let ng_home = env.dir().join("ng");

    env.command(&ng_home)
        .args(["status", "--all", "tomcat"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Status of redis service"))
        .stdout(predicate::str::contains("Status of tomcat service"));
}

#[test]
fn unknown_service_is_a_usage_error() {
    let env = TestEnv::new();
    let ng_home = env.dir().join("ng");

    env.command(&ng_home)
        .args(["status", "postgres"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown service 'postgres'"));
}

#[test]
fn missing_install_root_is_a_usage_error() {
    let env = TestEnv::new();
    let ng_home = env.dir().join("ng");

    env.command(&ng_home)
        .env_remove("NG_HOME")
        .arg("status")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("NG_HOME"));
}

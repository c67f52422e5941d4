#[path = "common/mod.rs"]
mod common;

use std::fs;

use common::{TestEnv, install_fake_redis, matching_pids};
use predicates::prelude::*;

#[test]
fn start_fails_when_service_binary_is_missing() {
    let env = TestEnv::new();
    let ng_home = env.dir().join("ng");
    fs::create_dir_all(&ng_home).unwrap();

    env.command(&ng_home)
        .args(["start", "redis"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Failed to start service 'redis'"));
}

#[test]
fn start_without_name_attempts_every_basic_service() {
    let env = TestEnv::new();
    let ng_home = env.dir().join("ng");
    fs::create_dir_all(&ng_home).unwrap();

    let assert = env.command(&ng_home).arg("start").assert().code(1);
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();

    for service in ["activemq", "mongodb", "ovclient", "tomcat"] {
        assert!(
            stdout.contains(&format!("Failed to start service '{service}'")),
            "missing {service} in: {stdout}"
        );
    }
    assert!(!stdout.contains("redis"));
}

#[test]
fn basic_name_is_an_alias_for_the_basic_group() {
    let env = TestEnv::new();
    let ng_home = env.dir().join("ng");

    env.command(&ng_home)
        .args(["stop", "basic"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tomcat service is not started!"))
        .stdout(predicate::str::contains("redis").not());
}

#[test]
fn stop_with_nothing_running_succeeds() {
    let env = TestEnv::new();
    let ng_home = env.dir().join("ng");

    let assert = env.command(&ng_home).arg("stop").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();

    assert_eq!(stdout.lines().count(), 8);
    assert!(
        stdout
            .lines()
            .all(|line| line.ends_with("service is not started!"))
    );
}

#[test]
fn stop_rejects_conflicting_group_flags() {
    let env = TestEnv::new();
    let ng_home = env.dir().join("ng");

    env.command(&ng_home)
        .args(["stop", "--basic", "--all"])
        .assert()
        .code(2);
}

#[test]
fn restart_requires_a_service_name() {
    let env = TestEnv::new();
    let ng_home = env.dir().join("ng");

    env.command(&ng_home).arg("restart").assert().code(2);
}

#[test]
fn invalid_stop_timeout_is_rejected() {
    let env = TestEnv::new();
    let ng_home = env.dir().join("ng");

    env.command(&ng_home)
        .args(["stop", "--stop-timeout", "soon"])
        .assert()
        .code(2);
}

#[test]
fn redis_lifecycle_through_the_binary() {
    let env = TestEnv::new();
    let ng_home = env.dir().join("ng");
    let redis_args = install_fake_redis(&ng_home);

    env.command(&ng_home)
        .args(["start", "redis"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("redis is started (pid "));

    let pids = matching_pids(&redis_args);
    assert_eq!(pids.len(), 1, "expected one redis process: {pids:?}");
    let pid = pids[0];

    env.command(&ng_home)
        .args(["status", "redis"])
        .assert()
        .success()
        .stdout(format!("Status of redis service: Running (pid {pid})\n"));

    env.command(&ng_home)
        .args(["start", "redis"])
        .assert()
        .success()
        .stdout(format!("redis service has been started! (pid {pid})\n"));
    assert_eq!(matching_pids(&redis_args), vec![pid]);

    let assert = env.command(&ng_home).args(["restart", "redis"]).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.starts_with("redis is restarted (pid "), "{stdout}");
    let restarted = matching_pids(&redis_args);
    assert_eq!(restarted.len(), 1);
    assert_ne!(restarted[0], pid);

    env.command(&ng_home)
        .args(["stop", "redis"])
        .assert()
        .success()
        .stdout("redis service is stopped.\n");

    env.command(&ng_home)
        .args(["status", "redis"])
        .assert()
        .success()
        .stdout("Status of redis service: NOT Running\n");
    assert!(matching_pids(&redis_args).is_empty());
}

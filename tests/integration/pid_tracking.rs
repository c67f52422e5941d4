//! PID record handling across supervisor instances and PID reuse.

#[path = "common/mod.rs"]
mod common;

use std::{
    fs,
    process::{Command, Stdio},
};

use common::{TestEnv, is_process_alive, matching_pids, unique_sleep};
use ovservice::{
    identity::ProcessIdentity,
    store::PidRecord,
    supervisor::{Outcome, ServiceState, ServiceStatus},
};

#[test]
fn new_supervisor_instance_finds_running_service() {
    let env = TestEnv::new();
    let args = unique_sleep();

    let pid = {
        let first = env.supervisor(vec![env.definition("durable", args.clone())]);
        match first.start("durable").unwrap() {
            Outcome::Started { pid } => pid,
            other => panic!("unexpected outcome: {other:?}"),
        }
    };

    let second = env.supervisor(vec![env.definition("durable", args.clone())]);
    assert_eq!(
        second.status("durable").unwrap(),
        ServiceStatus::Running { pid }
    );
    assert_eq!(
        second.start("durable").unwrap(),
        Outcome::AlreadyRunning { pid }
    );
    assert_eq!(second.stop("durable").unwrap(), Outcome::Stopped { pid });
    assert!(matching_pids(&args).is_empty());
}

#[test]
fn record_holds_pid_and_command() {
    let env = TestEnv::new();
    let args = unique_sleep();
    let supervisor = env.supervisor(vec![env.definition("recorded", args.clone())]);

    let Outcome::Started { pid } = supervisor.start("recorded").unwrap() else {
        panic!("expected a fresh start");
    };

    let record = supervisor
        .store()
        .load("recorded")
        .unwrap()
        .expect("record written on start");
    assert_eq!(record.service, "recorded");
    assert_eq!(record.pid, pid);
    assert_eq!(record.command, args);

    let raw = fs::read_to_string(env.paths.pid_record("recorded")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["pid"], pid);
    assert!(json["started_at"].is_string());

    supervisor.stop("recorded").unwrap();
}

#[test]
fn reused_pid_is_not_mistaken_for_the_service() {
    let env = TestEnv::new();
    let service_args = unique_sleep();
    let supervisor = env.supervisor(vec![env.definition("victim", service_args.clone())]);

    // An unrelated live process now owns the recorded PID.
    let unrelated_args = unique_sleep();
    let mut unrelated = Command::new(&unrelated_args[0])
        .args(&unrelated_args[1..])
        .stdout(Stdio::null())
        .spawn()
        .expect("spawn unrelated process");
    supervisor
        .store()
        .save(&PidRecord::from_identity(&ProcessIdentity {
            service: "victim".into(),
            pid: unrelated.id(),
            fingerprint: service_args.clone(),
        }))
        .unwrap();

    assert_eq!(
        supervisor.status("victim").unwrap(),
        ServiceStatus::NotRunning
    );
    assert_eq!(supervisor.state("victim").unwrap(), ServiceState::Stopped);

    let Outcome::Started { pid } = supervisor.start("victim").unwrap() else {
        panic!("start should launch despite the stale record");
    };
    assert_ne!(pid, unrelated.id());
    assert_eq!(supervisor.store().load("victim").unwrap().unwrap().pid, pid);

    supervisor.stop("victim").unwrap();
    assert!(is_process_alive(unrelated.id()), "unrelated process must be untouched");

    let _ = unrelated.kill();
    let _ = unrelated.wait();
}

#[test]
fn stop_never_signals_a_reused_pid() {
    let env = TestEnv::new();
    let supervisor = env.supervisor(vec![env.definition("gone", unique_sleep())]);

    let unrelated_args = unique_sleep();
    let mut unrelated = Command::new(&unrelated_args[0])
        .args(&unrelated_args[1..])
        .spawn()
        .expect("spawn unrelated process");
    supervisor
        .store()
        .save(&PidRecord::from_identity(&ProcessIdentity {
            service: "gone".into(),
            pid: unrelated.id(),
            fingerprint: Vec::new(),
        }))
        .unwrap();

    assert_eq!(supervisor.stop("gone").unwrap(), Outcome::NotRunning);
    assert!(is_process_alive(unrelated.id()));
    assert!(supervisor.store().load("gone").unwrap().is_none());

    let _ = unrelated.kill();
    let _ = unrelated.wait();
}

#[test]
fn lost_record_is_recovered_from_the_process_table() {
    let env = TestEnv::new();
    let args = unique_sleep();
    let supervisor = env.supervisor(vec![env.definition("orphan", args.clone())]);

    let Outcome::Started { pid } = supervisor.start("orphan").unwrap() else {
        panic!("expected a fresh start");
    };
    fs::remove_file(env.paths.pid_record("orphan")).unwrap();

    assert_eq!(
        supervisor.status("orphan").unwrap(),
        ServiceStatus::Running { pid }
    );
    assert_eq!(supervisor.stop("orphan").unwrap(), Outcome::Stopped { pid });
    assert!(matching_pids(&args).is_empty());
}

#[test]
fn corrupt_record_is_ignored() {
    let env = TestEnv::new();
    let supervisor = env.supervisor(vec![env.definition("garbled", unique_sleep())]);
    let record = env.paths.pid_record("garbled");
    fs::create_dir_all(record.parent().unwrap()).unwrap();
    fs::write(&record, "not json").unwrap();

    assert_eq!(
        supervisor.status("garbled").unwrap(),
        ServiceStatus::NotRunning
    );

    let Outcome::Started { pid } = supervisor.start("garbled").unwrap() else {
        panic!("expected a fresh start");
    };
    assert_eq!(supervisor.store().load("garbled").unwrap().unwrap().pid, pid);

    supervisor.stop("garbled").unwrap();
}

// SPDX-License-Identifier: Apache-2.0

//! End-to-end runs of the `emi-driver` binary against stub tooling.

#![cfg(unix)]

use std::process::{Command, Output};
use std::time::{Duration, Instant};

use emi_test_helpers::{count_files_with_suffix, MutatorBehavior, RunBehavior, StubEnv, STUB_ARTIFACT};
use pretty_assertions::assert_eq;

fn driver(env: &StubEnv) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_emi-driver"));
    command.current_dir(env.project_root()).arg(env.registry());
    command
}

fn run_driver(command: &mut Command) -> Output {
    command.output().expect("Failed to run emi-driver")
}

fn describe(output: &Output) -> String {
    format!(
        "status: {:?}\nstdout: {}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn read_checkpoint(env: &StubEnv) -> serde_json::Value {
    let text = std::fs::read_to_string(env.registry().join("checkpoint.json")).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn three_iterations_from_seed() {
    let env = StubEnv::builder().build();
    let output = run_driver(driver(&env).arg("--max-iters=3"));
    assert!(output.status.success(), "{}", describe(&output));

    assert_eq!(count_files_with_suffix(&env.dumps_dir(), ".hprof"), 3);
    assert_eq!(count_files_with_suffix(&env.coverage_dir(), ".exec"), 3);
    assert_eq!(count_files_with_suffix(&env.coverage_dir(), ".xml"), 3);
    assert_eq!(env.mutants().len(), 3);

    let seed_dump = std::fs::read_to_string(env.dumps_dir().join("seed.hprof")).unwrap();
    assert_eq!(seed_dump, STUB_ARTIFACT);

    // Each mutation starts from the variant minted by the previous one.
    let mutations: Vec<(String, String)> = env
        .mutator_log()
        .iter()
        .map(|line| {
            let (parent, child) = line.split_once(' ').unwrap();
            (parent.to_string(), child.to_string())
        })
        .collect();
    assert_eq!(mutations.len(), 3);
    assert_eq!(mutations[0].0, "seed");
    assert_eq!(mutations[1].0, mutations[0].1);
    assert_eq!(mutations[2].0, mutations[1].1);
    for (_, child) in &mutations {
        assert_eq!(child.len(), 16);
        assert!(child.chars().all(|c| c.is_ascii_hexdigit()));
    }

    // Seed runs from the registry root, mutants from their own directory;
    // each variant runs once per mode.
    let registry = std::fs::canonicalize(env.registry()).unwrap();
    let runs = env.run_log();
    assert_eq!(runs.len(), 6);
    assert_eq!(runs[0], format!("{} 0", registry.display()));
    assert_eq!(runs[1], format!("{} 1", registry.display()));
    assert_eq!(
        runs[2],
        format!("{} 0", registry.join("mutants").join(&mutations[0].1).display())
    );

    let checkpoint = read_checkpoint(&env);
    assert_eq!(checkpoint["current"], mutations[2].1.as_str());
    assert_eq!(checkpoint["iteration"], 3);
}

#[test]
fn failing_run_exits_nonzero_without_coverage() {
    let env = StubEnv::builder().run(RunBehavior::Fail).build();
    let output = run_driver(driver(&env).arg("--max-iters=1"));
    assert!(!output.status.success(), "{}", describe(&output));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("dump: "), "{}", stderr);
    assert!(stderr.contains("exit status 3"), "{}", stderr);
    assert!(stderr.contains("VerifyError"), "{}", stderr);

    assert_eq!(count_files_with_suffix(&env.coverage_dir(), ".exec"), 0);
    assert_eq!(count_files_with_suffix(&env.coverage_dir(), ".xml"), 0);
    assert!(env.mutants().is_empty());
    assert!(!env.registry().join("checkpoint.json").exists());
}

#[test]
fn resume_continues_from_checkpoint() {
    let env = StubEnv::builder().build();
    let first = run_driver(driver(&env).arg("--max-iters=2"));
    assert!(first.status.success(), "{}", describe(&first));
    let pointer = read_checkpoint(&env)["current"]
        .as_str()
        .unwrap()
        .to_string();

    let second = run_driver(driver(&env).args(["--resume", "--max-iters=1"]));
    assert!(second.status.success(), "{}", describe(&second));

    let mutations = env.mutator_log();
    assert_eq!(mutations.len(), 3);
    assert!(mutations[2].starts_with(&format!("{} ", pointer)));
    assert_eq!(read_checkpoint(&env)["iteration"], 3);
    assert!(env.dumps_dir().join(format!("{}.hprof", pointer)).exists());
}

#[test]
fn restarting_from_seed_keeps_lineage_numbering() {
    let env = StubEnv::builder().build();
    let first = run_driver(driver(&env).arg("--max-iters=2"));
    assert!(first.status.success(), "{}", describe(&first));

    let second = run_driver(driver(&env).arg("--max-iters=1"));
    assert!(second.status.success(), "{}", describe(&second));

    assert_eq!(read_checkpoint(&env)["iteration"], 3);
    let lineage = emi_test_helpers::read_lines(&env.registry().join("lineage.log"));
    let numbers: Vec<&str> = lineage
        .iter()
        .map(|line| line.split(' ').next().unwrap())
        .collect();
    assert_eq!(numbers, vec!["1", "2", "3"]);
    assert!(lineage[2].starts_with("3 seed "), "{:?}", lineage);
}

#[test]
fn resume_without_checkpoint_is_an_error() {
    let env = StubEnv::builder().build();
    let output = run_driver(driver(&env).arg("--resume"));
    assert!(!output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("checkpoint.json not found"), "{}", stderr);
}

#[test]
fn missing_heap_dump_lib_is_reported_before_running() {
    let env = StubEnv::builder().build();
    let lib = env.project_root().join("bazel-bin/libheap-dump.jar");
    std::fs::remove_file(&lib).unwrap();

    let output = run_driver(driver(&env).arg("--max-iters=1"));
    assert!(!output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("preflight: "), "{}", stderr);
    assert!(
        stderr.contains("libheap-dump.jar not found. The heap-dump library should be built."),
        "{}",
        stderr
    );
    assert!(env.run_log().is_empty());
    assert!(!env.dumps_dir().exists());
}

#[test]
fn running_outside_the_project_root_is_reported() {
    let env = StubEnv::builder().build();
    std::fs::remove_dir_all(env.project_root().join("bazel-bin")).unwrap();

    let output = run_driver(driver(&env).arg("--max-iters=1"));
    assert!(!output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("bazel-bin not found. Executable should be run from the bazel project root."),
        "{}",
        stderr
    );
}

#[test]
fn flag_overrides_toolchain_file() {
    let env = StubEnv::builder().build();
    let cli = env.temp_dir().join("elsewhere/jacococli.jar");
    let output = run_driver(
        driver(&env)
            .arg("--max-iters=1")
            .arg(format!("--jacoco-cli={}", cli.display())),
    );
    assert!(!output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("elsewhere/jacococli.jar not found"), "{}", stderr);
}

#[test]
fn lazy_mutator_surfaces_as_missing_variant() {
    let env = StubEnv::builder().mutator(MutatorBehavior::Lazy).build();
    let output = run_driver(driver(&env).arg("--max-iters=2"));
    assert!(!output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("resolve: variant "), "{}", stderr);
    assert_eq!(count_files_with_suffix(&env.dumps_dir(), ".hprof"), 1);
}

#[test]
fn heap_differ_compares_each_mutant_with_seed() {
    let env = StubEnv::builder().heap_differ(true).build();
    let output = run_driver(driver(&env).arg("--max-iters=3"));
    assert!(output.status.success(), "{}", describe(&output));

    let registry = std::fs::canonicalize(env.registry()).unwrap();
    let seed_dump = registry.join("dumps/seed.hprof");
    let diffs = env.heap_differ_log();
    assert_eq!(diffs.len(), 2);
    for (diff, line) in diffs.iter().zip(env.mutator_log().iter().take(2)) {
        let (_, child) = line.split_once(' ').unwrap();
        assert_eq!(
            diff,
            &format!(
                "--first {} --second {} --prefix com.example",
                seed_dump.display(),
                registry.join("dumps").join(format!("{}.hprof", child)).display()
            )
        );
    }
}

#[test]
fn invalid_seed_id_is_rejected() {
    let env = StubEnv::builder().build();
    let output = run_driver(driver(&env).arg("--seed=../escape"));
    assert!(!output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid variant id"), "{}", stderr);
}

#[test]
fn sigterm_stops_cleanly_and_kills_the_variant() {
    let env = StubEnv::builder().run(RunBehavior::Hang).build();
    let mut child = driver(&env)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .expect("Failed to spawn emi-driver");

    let deadline = Instant::now() + Duration::from_secs(20);
    while env.run_log().is_empty() {
        assert!(Instant::now() < deadline, "run script never started");
        std::thread::sleep(Duration::from_millis(50));
    }
    let started = Instant::now();
    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
    }
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "{}", describe(&output));
    assert!(started.elapsed() < Duration::from_secs(20));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Interrupted after 0 iterations"), "{}", stderr);
    assert!(env.mutants().is_empty());
}

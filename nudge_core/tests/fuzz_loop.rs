use nudge_api::{Finding, guide_towards_containment, guide_towards_equality, report_finding_from_hook};
use nudge_core::hook_context;
use nudge_core::oracle::dedup_token;
use nudge_core::{Corpus, Fuzzer, NudgeConfig};
use std::fs;
use std::panic::catch_unwind;
use std::sync::Once;
use std::thread;

static INSTALL: Once = Once::new();

fn install_engine() {
    INSTALL.call_once(|| nudge_core::install().expect("engine installs before any facade call"));
}

fn config(toml: &str) -> NudgeConfig {
    NudgeConfig::from_toml_str(toml).expect("valid test config")
}

fn magic_harness(data: &[u8]) {
    let text = String::from_utf8_lossy(data);
    let prefix: String = text.chars().take(4).collect();
    if prefix != "FUZZ" {
        guide_towards_equality(&prefix, "FUZZ", 7001);
        return;
    }
    panic!("magic value reached");
}

fn admin_harness(data: &[u8]) {
    let request = String::from_utf8_lossy(data);
    if !request.contains("/admin") {
        guide_towards_containment(&request, "/admin", 7002);
        return;
    }
    // A defensive target swallowing everything around the hooked call.
    let _ = catch_unwind(|| report_finding_from_hook(Finding::new("admin panel reached")));
}

fn worker_thread_harness(data: &[u8]) {
    let request = data.to_vec();
    let worker = thread::spawn(move || {
        if request.starts_with(b"INIT") {
            report_finding_from_hook(Finding::new("deserialization on worker thread"));
        }
    });
    let _ = worker.join();
}

fn parity_harness(data: &[u8]) {
    if data.first().is_some_and(|byte| byte % 2 == 0) {
        panic!("even");
    }
    panic!("odd");
}

#[test]
fn equality_hints_lead_to_magic_value() {
    install_engine();
    let config = config(
        r#"
        [fuzzer]
        max-iterations = 2000
        seed = 1
        hint-probability = 1.0
        "#,
    );
    let mut fuzzer = Fuzzer::new(&config, magic_harness).unwrap();
    let stats = fuzzer.run().unwrap();

    assert_eq!(stats.findings, 1);
    assert!(stats.stopped_early);
}

#[test]
fn hook_finding_escapes_broad_catch_and_is_saved() {
    install_engine();
    let artifacts = tempfile::tempdir().unwrap();
    let mut config = config(
        r#"
        [fuzzer]
        max-iterations = 2000
        seed = 2
        hint-probability = 1.0
        "#,
    );
    config.fuzzer.artifact_dir = Some(artifacts.path().to_path_buf());

    let mut fuzzer = Fuzzer::new(&config, admin_harness).unwrap();
    let stats = fuzzer.run().unwrap();
    assert_eq!(stats.findings, 1);
    assert!(stats.stopped_early);

    let saved: Vec<_> = fs::read_dir(artifacts.path())
        .unwrap()
        .map(|entry| entry.unwrap())
        .collect();
    assert_eq!(saved.len(), 1);
    assert!(
        saved[0]
            .file_name()
            .to_string_lossy()
            .starts_with("crash-")
    );
    let input = fs::read(saved[0].path()).unwrap();
    assert!(String::from_utf8_lossy(&input).contains("/admin"));
}

#[test]
fn hook_finding_on_worker_thread_is_reported() {
    install_engine();
    let config = config("[fuzzer]\nmax-iterations = 0\n");

    let mut fuzzer = Fuzzer::new(&config, worker_thread_harness).unwrap();
    let stats = fuzzer.run().unwrap();

    assert_eq!(stats.executions, 1);
    assert_eq!(stats.findings, 1);
    assert!(stats.stopped_early);
}

#[test]
fn keep_going_collects_distinct_findings() {
    install_engine();
    let config = config(
        r#"
        [fuzzer]
        max-iterations = 20000
        seed = 3
        keep-going = 2
        hint-probability = 0.0
        "#,
    );
    let mut fuzzer = Fuzzer::new(&config, parity_harness).unwrap();
    let stats = fuzzer.run().unwrap();

    assert_eq!(stats.findings, 2);
    assert!(stats.stopped_early);
}

#[test]
fn ignored_findings_are_skipped() {
    install_engine();
    let mut config = config(
        r#"
        [fuzzer]
        max-iterations = 20000
        seed = 4
        hint-probability = 0.0
        "#,
    );
    config.fuzzer.ignore = vec![format!("{:016x}", dedup_token("odd"))];

    let mut fuzzer = Fuzzer::new(&config, parity_harness).unwrap();
    let stats = fuzzer.run().unwrap();

    // The default seed starts with an odd byte, so at least one skip happens.
    assert_eq!(stats.findings, 1);
    assert!(stats.skipped_findings >= 1);
    assert!(stats.stopped_early);
}

#[test]
fn seeds_are_executed_before_mutation() {
    install_engine();
    let seeds = tempfile::tempdir().unwrap();
    fs::write(seeds.path().join("benign"), b"hello").unwrap();
    fs::write(seeds.path().join("crashing"), b"FUZZ").unwrap();

    let mut config = config("[fuzzer]\nmax-iterations = 0\n");
    config.corpus.initial_seed_paths = Some(vec![seeds.path().to_path_buf()]);

    let mut fuzzer = Fuzzer::new(&config, magic_harness).unwrap();
    assert_eq!(fuzzer.corpus().len(), 2);
    let stats = fuzzer.run().unwrap();

    assert_eq!(stats.findings, 1);
    assert!(stats.executions <= 2);
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = config("[fuzzer]\ndedup = false\nkeep-going = 3\n");
    assert!(Fuzzer::new(&config, magic_harness).is_err());

    config.fuzzer.keep_going = 1;
    assert!(Fuzzer::new(&config, magic_harness).is_ok());
}

#[test]
fn reporting_outside_a_harness_is_not_fatal() {
    install_engine();
    let _execution = hook_context::lock_execution();
    let result = catch_unwind(|| report_finding_from_hook(Finding::new("called from target code")));
    assert!(result.is_ok());
}

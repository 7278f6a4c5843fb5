mod common;

use nudge_api::exports::{publish, published};
use nudge_api::{
    EngineExports, Escalation, Export, Finding, FindingSink, PublishError,
    REPORT_FINDING_FROM_HOOK, TRACE_STRCMP, TRACE_STRSTR, binding,
};
use std::sync::{Arc, Barrier};
use std::thread;

const RACES: usize = 16;

fn strcmp(_: &str, _: &str, _: i32, _: i32) {}
fn strstr(_: &str, _: &str, _: i32) {}

struct RaisingSink;

impl FindingSink for RaisingSink {
    fn report_finding_from_hook(&self, finding: Finding) {
        Escalation::raise(finding);
    }
}

fn complete_exports() -> EngineExports {
    EngineExports::new()
        .export(REPORT_FINDING_FROM_HOOK, Export::FindingSink(Arc::new(RaisingSink)))
        .export(TRACE_STRCMP, Export::TraceStrcmp(strcmp))
        .export(TRACE_STRSTR, Export::TraceStrstr(strstr))
}

/// Publishes and resolves the binding from two threads at once, then checks
/// that the outcome of `publish` agrees with what the binding saw.
#[test]
#[ignore = "runs in a child process"]
fn race_publication_against_first_use() {
    if !common::in_child() {
        return;
    }
    let start = Arc::new(Barrier::new(2));

    let publisher = {
        let start = Arc::clone(&start);
        thread::spawn(move || {
            start.wait();
            publish(complete_exports())
        })
    };
    let resolver = {
        let start = Arc::clone(&start);
        thread::spawn(move || {
            start.wait();
            binding().is_present()
        })
    };

    let published_result = publisher.join().expect("publisher thread");
    let bound_to_engine = resolver.join().expect("resolver thread");

    match published_result {
        Ok(()) => {
            assert!(bound_to_engine);
            assert!(published().is_some());
        }
        Err(err) => {
            assert_eq!(err, PublishError::BindingAlreadyResolved);
            assert!(!bound_to_engine);
            assert!(published().is_none());
        }
    }
    assert_eq!(binding().is_present(), bound_to_engine);
}

#[test]
fn publication_and_first_use_agree() {
    for _ in 0..RACES {
        let output = common::run_child("race_publication_against_first_use");
        assert!(
            output.status.success(),
            "child failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        assert!(String::from_utf8_lossy(&output.stdout).contains("1 passed"));
    }
}

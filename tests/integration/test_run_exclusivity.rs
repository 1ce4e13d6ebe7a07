//! One run at a time across both modes, and the scheduler built on that.

use std::sync::{Arc, Barrier};
use std::thread;

use artvec::config::SchedulerConfig;
use artvec::jobs::Scheduler;
use artvec::{DocumentId, RunMode, VectorIndex};

use crate::common::{GatedIndex, Harness, article, football_articles};

#[test]
fn second_full_run_is_skipped_while_first_holds_the_token() {
    let (index, gate) = GatedIndex::new();
    let index = Arc::new(index);
    let harness = Harness::with_index(football_articles(), index.clone());

    let first = {
        let pipeline = harness.pipeline();
        thread::spawn(move || pipeline.run(RunMode::Full))
    };
    gate.entered.recv().unwrap();

    let updates_before = harness.corpus.update_statements();
    let second = harness.pipeline().run(RunMode::Full);
    assert!(second.is_skipped());
    assert_eq!(harness.corpus.connections_opened(), 1);
    assert_eq!(harness.corpus.update_statements(), updates_before);

    gate.release.send(()).unwrap();
    let first = first.join().unwrap();
    assert_eq!(first.report().unwrap().written.len(), 5);
    assert_eq!(index.count().unwrap(), 5);
}

#[test]
fn incremental_run_is_skipped_during_full_run() {
    let (index, gate) = GatedIndex::new();
    let harness = Harness::with_index(football_articles(), Arc::new(index));

    let full = {
        let pipeline = harness.pipeline();
        thread::spawn(move || pipeline.run(RunMode::Full))
    };
    gate.entered.recv().unwrap();

    assert_eq!(harness.ctx.coordinator.active_mode(), Some(RunMode::Full));
    assert!(harness.pipeline().run(RunMode::Incremental).is_skipped());

    gate.release.send(()).unwrap();
    assert!(full.join().unwrap().report().is_some());
    assert!(!harness.ctx.coordinator.is_running());
    assert!(harness.pipeline().run(RunMode::Incremental).report().is_some());
}

#[test]
fn simultaneous_full_runs_let_exactly_one_through() {
    let (index, gate) = GatedIndex::new();
    let index = Arc::new(index);
    let harness = Harness::with_index(football_articles(), index.clone());
    let threads = 6;
    let barrier = Arc::new(Barrier::new(threads));
    let (done_tx, done_rx) = crossbeam_channel::unbounded();

    for _ in 0..threads {
        let pipeline = harness.pipeline();
        let barrier = Arc::clone(&barrier);
        let done = done_tx.clone();
        thread::spawn(move || {
            barrier.wait();
            let _ = done.send(pipeline.run(RunMode::Full));
        });
    }

    // The winner is parked on its first write, so every other request has
    // to come back skipped
    gate.entered.recv().unwrap();
    for _ in 1..threads {
        assert!(done_rx.recv().unwrap().is_skipped());
    }

    gate.release.send(()).unwrap();
    let winner = done_rx.recv().unwrap();
    assert_eq!(winner.report().unwrap().written.len(), 5);
    assert_eq!(harness.corpus.connections_opened(), 1);
    assert_eq!(harness.corpus.open_connections(), 0);
    assert_eq!(index.count().unwrap(), 5);
}

#[test]
fn scheduler_runs_initial_full_then_ticks() {
    let (harness, index) = Harness::new(football_articles());
    let config = SchedulerConfig {
        incremental_interval_secs: 1,
        full_interval_secs: 2,
        full_on_start: true,
        skip_warn_threshold: 3,
    };

    let handle = Scheduler::new(harness.pipeline(), &config)
        .with_max_ticks(1)
        .start();
    assert_eq!(index.count().unwrap(), 5);

    // Lands between the initial full run and the first incremental tick
    harness.corpus.insert(article(6, "Derby preview", "A tight derby"));

    let stats = handle.join();
    assert_eq!(stats.len(), 2);
    for (_, worker) in &stats {
        assert_eq!(worker.ticks, 1);
        assert_eq!(worker.failed, 0);
    }
    assert!(index.get(DocumentId::new(6)).is_some());
    assert_eq!(harness.corpus.indexed_ids().len(), 6);
}

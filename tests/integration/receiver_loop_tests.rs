//! Integration tests for the continuous receiver loop.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use fifo_ack::exchange::Exchange;
use fifo_ack::pipe::{open_for_write, WriteOpen};
use fifo_ack::receiver::{LoopExit, LoopState, ReceiverLoop};
use fifo_ack::{GlobalConfig, Result};
use serial_test::serial;
use tokio_util::sync::CancellationToken;

use super::test_helpers::{wait_for_reader, PipePair};

type LoopHandle = JoinHandle<(Result<LoopExit>, ReceiverLoop)>;

fn spawn_loop(
    config: &GlobalConfig,
    cancel: CancellationToken,
    listen_only: bool,
) -> (LoopHandle, mpsc::Receiver<Vec<u8>>) {
    let (tx, rx) = mpsc::channel();
    let mut receiver = ReceiverLoop::new(config, cancel);
    if listen_only {
        receiver = receiver.listen_only();
    }

    let handle = thread::spawn(move || {
        let exit = receiver.run(|block| {
            let _ = tx.send(block.to_vec());
        });
        (exit, receiver)
    });
    (handle, rx)
}

#[test]
fn sentinel_stops_loop_after_prior_exchanges() {
    let pair = PipePair::new();
    let (handle, blocks) = spawn_loop(&pair.config, CancellationToken::new(), false);
    let exchange = Exchange::new(pair.config.clone());

    for payload in ["one", "two", "quit"] {
        let outcome = exchange.request(payload.as_bytes()).expect("exchange");
        assert_eq!(outcome.ack, b"ACK");
    }

    let (exit, receiver) = handle.join().expect("loop thread");
    assert_eq!(exit.expect("loop result"), LoopExit::Sentinel);
    assert_eq!(receiver.state(), LoopState::Stopped);
    assert_eq!(receiver.received(), 3);
    assert_eq!(receiver.acknowledged(), 3);

    let seen: Vec<Vec<u8>> = blocks.try_iter().collect();
    assert_eq!(seen, [b"one".to_vec(), b"two".to_vec(), b"quit".to_vec()]);
}

#[test]
fn loop_releases_handle_on_exit() {
    let pair = PipePair::new();
    let (handle, _blocks) = spawn_loop(&pair.config, CancellationToken::new(), false);

    Exchange::new(pair.config.clone())
        .request(b"quit")
        .expect("exchange");
    let (exit, _) = handle.join().expect("loop thread");
    assert_eq!(exit.expect("loop result"), LoopExit::Sentinel);

    let outcome = open_for_write(pair.set_pipe()).expect("open");
    assert!(
        matches!(outcome, WriteOpen::NotReady),
        "no reader may remain attached after the loop exits"
    );
}

#[test]
fn sentinel_requires_exact_match() {
    let pair = PipePair::new();
    let (handle, blocks) = spawn_loop(&pair.config, CancellationToken::new(), false);
    let exchange = Exchange::new(pair.config.clone());

    exchange.request(b"quitter").expect("prefix is not the sentinel");
    exchange.request(b"quit\n").expect("trailing newline is not the sentinel");
    assert!(!handle.is_finished(), "loop must still be running");

    exchange.request(b"quit").expect("sentinel");
    let (exit, receiver) = handle.join().expect("loop thread");
    assert_eq!(exit.expect("loop result"), LoopExit::Sentinel);
    assert_eq!(receiver.received(), 3);
    assert_eq!(blocks.try_iter().count(), 3);
}

#[test]
fn cancelled_before_start_reads_nothing() {
    let pair = PipePair::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut receiver = ReceiverLoop::new(&pair.config, cancel);
    let mut calls = 0;
    let exit = receiver.run(|_| calls += 1).expect("loop result");

    assert_eq!(exit, LoopExit::Cancelled);
    assert_eq!(calls, 0);
    assert_eq!(receiver.state(), LoopState::Stopped);
    assert_eq!(receiver.received(), 0);
}

#[test]
#[serial]
fn cancellation_between_exchanges_halts_within_a_quantum() {
    let pair = PipePair::new();
    let cancel = CancellationToken::new();
    let (handle, blocks) = spawn_loop(&pair.config, cancel.clone(), false);

    Exchange::new(pair.config.clone())
        .request(b"first")
        .expect("exchange");
    thread::sleep(Duration::from_millis(50));

    let cancelled_at = Instant::now();
    cancel.cancel();
    let (exit, receiver) = handle.join().expect("loop thread");
    let elapsed = cancelled_at.elapsed();

    assert_eq!(exit.expect("loop result"), LoopExit::Cancelled);
    assert!(
        elapsed < pair.config.poll_quantum() + Duration::from_millis(150),
        "loop took {elapsed:?} to observe cancellation"
    );
    assert_eq!(receiver.received(), 1);
    assert_eq!(blocks.try_iter().count(), 1);

    let outcome = open_for_write(pair.set_pipe()).expect("open");
    assert!(matches!(outcome, WriteOpen::NotReady));
}

#[test]
fn listen_only_loop_never_acknowledges() {
    let pair = PipePair::new();
    let (handle, blocks) = spawn_loop(&pair.config, CancellationToken::new(), true);
    let exchange = Exchange::new(pair.config.clone());

    exchange.write_only(b"hello").expect("write");
    let first = blocks
        .recv_timeout(Duration::from_secs(5))
        .expect("loop emits first block");
    assert_eq!(first, b"hello");

    exchange.write_only(b"quit").expect("write sentinel");
    let (exit, receiver) = handle.join().expect("loop thread");

    assert_eq!(exit.expect("loop result"), LoopExit::Sentinel);
    assert_eq!(receiver.received(), 2);
    assert_eq!(receiver.acknowledged(), 0);
    assert!(!pair.get_pipe().exists(), "listen-only loop must not touch the ACK pipe");
}

#[test]
fn writer_started_before_pipe_exists_reaches_loop() {
    let pair = PipePair::new();
    assert!(!pair.set_pipe().exists());
    let (handle, blocks) = spawn_loop(&pair.config, CancellationToken::new(), true);

    let mut writer = wait_for_reader(pair.set_pipe(), Duration::from_secs(5));
    std::io::Write::write_all(&mut writer, b"quit").expect("write");
    drop(writer);

    let (exit, receiver) = handle.join().expect("loop thread");
    assert_eq!(exit.expect("loop result"), LoopExit::Sentinel);
    assert_eq!(receiver.received(), 1);
    assert_eq!(blocks.try_iter().count(), 1);
}

#[test]
#[serial]
fn unanswered_ack_does_not_stop_loop() {
    let mut pair = PipePair::new();
    pair.config.timeouts.ack_write_seconds = 0.05;
    let (handle, blocks) = spawn_loop(&pair.config, CancellationToken::new(), false);

    // Raw writes with nobody reading the ACK pipe.
    let mut writer = wait_for_reader(pair.set_pipe(), Duration::from_secs(5));
    std::io::Write::write_all(&mut writer, b"orphan").expect("write");
    drop(writer);
    assert_eq!(
        blocks.recv_timeout(Duration::from_secs(5)).expect("block"),
        b"orphan"
    );

    let mut writer = wait_for_reader(pair.set_pipe(), Duration::from_secs(5));
    std::io::Write::write_all(&mut writer, b"quit").expect("write");
    drop(writer);

    let (exit, receiver) = handle.join().expect("loop thread");
    assert_eq!(exit.expect("loop result"), LoopExit::Sentinel);
    assert_eq!(receiver.received(), 2);
    assert_eq!(receiver.acknowledged(), 0);
}

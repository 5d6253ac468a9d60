//! Simulated clock and expectation helpers shared by the mocked process boundaries.

use mockall::Sequence;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::formatter::MockPacer;
use crate::sink::{CommandSink, MockCommandSink, MockSinkFactory};
use crate::status::MockStatusQuerier;
use crate::types::Delivery;

#[derive(Clone, Default)]
pub struct SimClock(Arc<Mutex<Duration>>);

impl SimClock {
    pub fn now(&self) -> Duration {
        *self.0.lock().unwrap()
    }

    fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

/// A pacer that moves `clock` forward instead of sleeping.
pub fn sim_pacer(clock: &SimClock) -> MockPacer {
    let clock = clock.clone();
    let mut pacer = MockPacer::new();
    pacer
        .expect_pause()
        .returning(move |delay| clock.advance(delay));
    pacer
}

/// Expects exactly `commands`, in order, each sent at least `spacing` after the previous one.
pub fn expect_commands(
    sink: &mut MockCommandSink,
    clock: &SimClock,
    spacing: Duration,
    commands: &[&str],
) {
    let mut seq = Sequence::new();
    let mut earliest = Duration::ZERO;
    for command in commands {
        let expected = (*command).to_string();
        let clock = clock.clone();
        let not_before = earliest;
        sink.expect_send()
            .withf(move |sent: &str| sent == expected)
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| {
                assert!(clock.now() >= not_before, "command sent too early");
                Ok(Delivery::Completed)
            });
        earliest += spacing;
    }
}

/// A sink that expects to be shown once and then receive `commands` in order.
pub fn shown_sink(clock: &SimClock, spacing: Duration, commands: &[&str]) -> MockCommandSink {
    let mut sink = MockCommandSink::new();
    sink.expect_show().times(1).returning(|| Ok(()));
    expect_commands(&mut sink, clock, spacing, commands);
    sink
}

/// A factory that hands out `sink` on the first and only `open`.
pub fn opening(sink: MockCommandSink) -> MockSinkFactory {
    let mut sinks = MockSinkFactory::new();
    sinks
        .expect_open()
        .times(1)
        .return_once(move |_| Ok(Box::new(sink) as Box<dyn CommandSink>));
    sinks
}

/// A factory that must never be asked for a sink.
pub fn never_opened() -> MockSinkFactory {
    let mut sinks = MockSinkFactory::new();
    sinks.expect_open().never();
    sinks
}

/// A querier that answers `times` queries with `output`.
pub fn querier_returning(output: &'static str, times: usize) -> MockStatusQuerier {
    let mut querier = MockStatusQuerier::new();
    querier
        .expect_query_status()
        .times(times)
        .returning(move |_| Ok(output.to_string()));
    querier
}

//! Live patch subscriber: owns the streaming connection for one view.
//!
//! Connection lifecycle: `connecting -> open` on handshake, back to
//! `connecting` with capped exponential backoff on abnormal close, `closed`
//! on deliberate teardown or the `finished` sentinel — never resurrected.
//! Every physical connection carries a generation token; a frame from a
//! superseded generation is discarded at the apply step, so a late event
//! cannot mutate torn-down state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::core::{StreamFrame, SyncEntity};
use crate::sync::backoff::{Backoff, BackoffPolicy};
use crate::sync::handle::SharedState;
use crate::sync::transport::{ConnectionEvent, StreamConnection, StreamTransport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub retry_count: u32,
    /// Bumped on every connection attempt and on teardown.
    pub generation: u64,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            retry_count: 0,
            generation: 0,
        }
    }
}

/// Handle to the reader thread. Dropping it flags shutdown without joining;
/// `shutdown` joins as well.
pub struct Subscriber<E: SyncEntity> {
    shared: SharedState<E>,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl<E: SyncEntity> Subscriber<E> {
    pub(crate) fn spawn<T: StreamTransport>(
        transport: T,
        shared: SharedState<E>,
        policy: BackoffPolicy,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shared = Arc::clone(&shared);
        let thread_shutdown = Arc::clone(&shutdown);
        let join = thread::spawn(move || {
            run_subscriber_loop(transport, thread_shared, thread_shutdown, policy);
        });
        Self {
            shared,
            shutdown,
            join: Some(join),
        }
    }

    /// Deliberate teardown: invalidate the generation so in-flight frames
    /// are dropped, then join the reader thread.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        mark_closed(&self.shared);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl<E: SyncEntity> Drop for Subscriber<E> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        mark_closed(&self.shared);
    }
}

enum Drain {
    /// Clean end: `finished` sentinel, deliberate close, or teardown.
    Deliberate,
    /// Abnormal close or receive error: reconnect after backoff.
    Abnormal,
}

fn run_subscriber_loop<E, T>(
    mut transport: T,
    shared: SharedState<E>,
    shutdown: Arc<AtomicBool>,
    policy: BackoffPolicy,
) where
    E: SyncEntity,
    T: StreamTransport,
{
    let mut backoff = Backoff::new(policy);

    while !shutdown.load(Ordering::Relaxed) {
        let Some(generation) = begin_attempt(&shared) else {
            break;
        };

        match transport.connect() {
            Ok(mut conn) => {
                if !mark_open(&shared, generation) {
                    break;
                }
                backoff.reset();
                match drain_connection(&mut conn, &shared, generation, &shutdown) {
                    Drain::Deliberate => break,
                    Drain::Abnormal => {}
                }
            }
            Err(err) => {
                warn!("live stream connect failed: {err}");
            }
        }

        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        bump_retry(&shared);
        sleep_with_shutdown(backoff.next_delay(), &shutdown);
    }

    mark_closed(&shared);
}

fn drain_connection<E: SyncEntity, C: StreamConnection>(
    conn: &mut C,
    shared: &SharedState<E>,
    generation: u64,
    shutdown: &AtomicBool,
) -> Drain {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return Drain::Deliberate;
        }
        match conn.next_event() {
            Ok(ConnectionEvent::Text(text)) => {
                if let Some(drain) = handle_frame(shared, generation, &text) {
                    return drain;
                }
            }
            Ok(ConnectionEvent::Closed(frame)) => {
                if frame.is_deliberate() {
                    return Drain::Deliberate;
                }
                warn!(code = frame.code, "live stream closed abnormally");
                return Drain::Abnormal;
            }
            Err(err) => {
                warn!("live stream receive failed: {err}");
                return Drain::Abnormal;
            }
        }
    }
}

fn handle_frame<E: SyncEntity>(
    shared: &SharedState<E>,
    generation: u64,
    text: &str,
) -> Option<Drain> {
    match serde_json::from_str::<StreamFrame>(text) {
        Ok(StreamFrame::JsonPatch(batch)) => {
            let Ok(mut state) = shared.lock() else {
                return Some(Drain::Deliberate);
            };
            if state.connection.status == ConnectionStatus::Closed
                || state.connection.generation != generation
            {
                debug!("dropping patch batch from superseded connection");
                return Some(Drain::Deliberate);
            }
            state.reconciler.apply_batch(&batch);
            None
        }
        Ok(StreamFrame::Finished(true)) => {
            debug!("live stream finished");
            Some(Drain::Deliberate)
        }
        Ok(StreamFrame::Finished(false)) => None,
        Err(_) => {
            // Expected noise on shared multi-collection streams.
            trace!("ignoring undecodable frame");
            None
        }
    }
}

fn begin_attempt<E: SyncEntity>(shared: &SharedState<E>) -> Option<u64> {
    let mut state = shared.lock().ok()?;
    if state.connection.status == ConnectionStatus::Closed {
        return None;
    }
    state.connection.status = ConnectionStatus::Connecting;
    state.connection.generation += 1;
    Some(state.connection.generation)
}

fn mark_open<E: SyncEntity>(shared: &SharedState<E>, generation: u64) -> bool {
    let Ok(mut state) = shared.lock() else {
        return false;
    };
    if state.connection.status == ConnectionStatus::Closed
        || state.connection.generation != generation
    {
        return false;
    }
    state.connection.status = ConnectionStatus::Open;
    state.connection.retry_count = 0;
    true
}

fn bump_retry<E: SyncEntity>(shared: &SharedState<E>) {
    if let Ok(mut state) = shared.lock()
        && state.connection.status != ConnectionStatus::Closed
    {
        state.connection.status = ConnectionStatus::Connecting;
        state.connection.retry_count += 1;
    }
}

fn mark_closed<E: SyncEntity>(shared: &SharedState<E>) {
    if let Ok(mut state) = shared.lock() {
        state.connection.status = ConnectionStatus::Closed;
        state.connection.generation += 1;
    }
}

/// Sleep the backoff delay in short naps so teardown cancels the pending
/// reconnect instead of waiting it out.
fn sleep_with_shutdown(delay: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + delay;
    while !shutdown.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(std::cmp::min(deadline - now, Duration::from_millis(20)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use crate::core::Reconciler;
    use crate::model::{Task, TaskStatus};
    use crate::sync::handle::EngineState;
    use crate::sync::transport::CloseFrame;

    struct ScriptConnection {
        events: VecDeque<Result<ConnectionEvent, crate::sync::TransportError>>,
    }

    impl StreamConnection for ScriptConnection {
        fn next_event(&mut self) -> Result<ConnectionEvent, crate::sync::TransportError> {
            self.events.pop_front().unwrap_or(Ok(ConnectionEvent::Closed(CloseFrame {
                code: 1000,
                was_clean: true,
            })))
        }
    }

    struct ScriptTransport {
        connections: Mutex<VecDeque<ScriptConnection>>,
        connects: Arc<AtomicUsize>,
    }

    impl ScriptTransport {
        fn new(
            scripts: Vec<Vec<Result<ConnectionEvent, crate::sync::TransportError>>>,
        ) -> (Self, Arc<AtomicUsize>) {
            let connects = Arc::new(AtomicUsize::new(0));
            let transport = Self {
                connections: Mutex::new(
                    scripts
                        .into_iter()
                        .map(|events| ScriptConnection {
                            events: events.into(),
                        })
                        .collect(),
                ),
                connects: Arc::clone(&connects),
            };
            (transport, connects)
        }
    }

    impl StreamTransport for ScriptTransport {
        type Conn = ScriptConnection;

        fn connect(&mut self) -> Result<ScriptConnection, crate::sync::TransportError> {
            self.connects.fetch_add(1, Ordering::Relaxed);
            self.connections
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| crate::sync::TransportError::Connect("script exhausted".into()))
        }
    }

    fn shared_state() -> SharedState<Task> {
        Arc::new(Mutex::new(EngineState {
            reconciler: Reconciler::new(Task::TEST_PROJECT),
            connection: ConnectionState::default(),
            error: None,
        }))
    }

    fn policy() -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(5),
            max: Duration::from_millis(10),
        }
    }

    fn patch_text(task: &Task) -> String {
        serde_json::to_string(&StreamFrame::JsonPatch(vec![crate::core::WireOp::add(
            format!("/tasks/{}", task.id),
            serde_json::to_value(task).unwrap(),
        )]))
        .unwrap()
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn status(shared: &SharedState<Task>) -> ConnectionStatus {
        shared.lock().unwrap().connection.status
    }

    #[test]
    fn finished_sentinel_closes_without_reconnect() {
        let task = Task::test_fixture("a", TaskStatus::Todo, 1);
        let (transport, connects) = ScriptTransport::new(vec![vec![
            Ok(ConnectionEvent::Text(patch_text(&task))),
            Ok(ConnectionEvent::Text(r#"{"finished":true}"#.into())),
        ]]);
        let shared = shared_state();
        let subscriber = Subscriber::spawn(transport, Arc::clone(&shared), policy());

        wait_until(|| status(&shared) == ConnectionStatus::Closed);
        assert_eq!(connects.load(Ordering::Relaxed), 1);
        assert_eq!(shared.lock().unwrap().reconciler.len(), 1);
        subscriber.shutdown();
    }

    #[test]
    fn abnormal_close_reconnects_with_duplicate_replay() {
        let task = Task::test_fixture("a", TaskStatus::Todo, 1);
        let (transport, connects) = ScriptTransport::new(vec![
            vec![
                Ok(ConnectionEvent::Text(patch_text(&task))),
                Ok(ConnectionEvent::Closed(CloseFrame {
                    code: 1006,
                    was_clean: false,
                })),
            ],
            vec![
                // Re-delivery of the same operation after reconnect.
                Ok(ConnectionEvent::Text(patch_text(&task))),
                Ok(ConnectionEvent::Text(r#"{"finished":true}"#.into())),
            ],
        ]);
        let shared = shared_state();
        let subscriber = Subscriber::spawn(transport, Arc::clone(&shared), policy());

        wait_until(|| status(&shared) == ConnectionStatus::Closed);
        assert_eq!(connects.load(Ordering::Relaxed), 2);

        let state = shared.lock().unwrap();
        assert_eq!(state.reconciler.len(), 1);
        assert_eq!(
            state.reconciler.partition_state(&TaskStatus::Todo).total,
            1,
            "replayed add must not double-count"
        );
        drop(state);
        subscriber.shutdown();
    }

    #[test]
    fn receive_errors_trigger_reconnect() {
        let (transport, connects) = ScriptTransport::new(vec![
            vec![Err(crate::sync::TransportError::Receive("reset".into()))],
            vec![Ok(ConnectionEvent::Text(r#"{"finished":true}"#.into()))],
        ]);
        let shared = shared_state();
        let subscriber = Subscriber::spawn(transport, Arc::clone(&shared), policy());

        wait_until(|| status(&shared) == ConnectionStatus::Closed);
        assert_eq!(connects.load(Ordering::Relaxed), 2);
        subscriber.shutdown();
    }

    #[test]
    fn undecodable_frames_are_ignored() {
        let task = Task::test_fixture("a", TaskStatus::Todo, 1);
        let (transport, _) = ScriptTransport::new(vec![vec![
            Ok(ConnectionEvent::Text("{\"Stdout\":\"noise\"}".into())),
            Ok(ConnectionEvent::Text("not json at all".into())),
            Ok(ConnectionEvent::Text(patch_text(&task))),
            Ok(ConnectionEvent::Text(r#"{"finished":true}"#.into())),
        ]]);
        let shared = shared_state();
        let subscriber = Subscriber::spawn(transport, Arc::clone(&shared), policy());

        wait_until(|| status(&shared) == ConnectionStatus::Closed);
        assert_eq!(shared.lock().unwrap().reconciler.len(), 1);
        subscriber.shutdown();
    }

    #[test]
    fn frames_from_a_superseded_generation_are_dropped() {
        let task = Task::test_fixture("a", TaskStatus::Todo, 1);
        let shared = shared_state();
        shared.lock().unwrap().connection.generation = 2;

        let drain = handle_frame(&shared, 1, &patch_text(&task));
        assert!(matches!(drain, Some(Drain::Deliberate)));
        assert!(shared.lock().unwrap().reconciler.is_empty());
    }

    #[test]
    fn shutdown_is_terminal_and_joins() {
        let (transport, _) = ScriptTransport::new(vec![vec![Ok(ConnectionEvent::Closed(
            CloseFrame {
                code: 1006,
                was_clean: false,
            },
        ))]]);
        let shared = shared_state();
        let subscriber = Subscriber::spawn(transport, Arc::clone(&shared), policy());

        wait_until(|| shared.lock().unwrap().connection.generation >= 1);
        subscriber.shutdown();
        assert_eq!(status(&shared), ConnectionStatus::Closed);

        // A handle is never resurrected after close.
        let generation = shared.lock().unwrap().connection.generation;
        thread::sleep(Duration::from_millis(30));
        assert_eq!(shared.lock().unwrap().connection.generation, generation);
        assert_eq!(status(&shared), ConnectionStatus::Closed);
    }
}

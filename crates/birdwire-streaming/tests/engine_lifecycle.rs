//! Engine lifecycle tests against a scripted in-memory transport.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use birdwire_streaming::{
    Flow, LineReader, StreamConnection, StreamEngine, StreamError, StreamResult, StreamState,
    TransportError,
};
use birdwire_testkit::init_test_tracing;
use parking_lot::Mutex;

/// One scripted outcome of a `read_line` call.
#[derive(Debug, Clone, Copy)]
enum Step {
    Line(&'static str),
    Silence,
    Closed,
    Fail,
}

#[derive(Debug, Default)]
struct Counters {
    connections: AtomicUsize,
    readers: AtomicUsize,
    readers_dropped: AtomicUsize,
    aborts: AtomicUsize,
}

impl Counters {
    fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    fn readers(&self) -> usize {
        self.readers.load(Ordering::SeqCst)
    }

    fn readers_dropped(&self) -> usize {
        self.readers_dropped.load(Ordering::SeqCst)
    }

    fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }
}

/// Shared script; every reader of every connection pops from it. An empty
/// script blocks the read forever.
#[derive(Clone)]
struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Step>>>,
    counters: Arc<Counters>,
    open_limit: Option<usize>,
}

impl ScriptedTransport {
    fn new(steps: &[Step]) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.iter().copied().collect())),
            counters: Arc::new(Counters::default()),
            open_limit: None,
        }
    }

    /// Reader opens past the first `limit` never complete.
    const fn hang_opens_after(mut self, limit: usize) -> Self {
        self.open_limit = Some(limit);
        self
    }

    fn connect(&self) -> StreamResult<ScriptedConnection> {
        self.counters.connections.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedConnection {
            transport: self.clone(),
        })
    }
}

struct ScriptedConnection {
    transport: ScriptedTransport,
}

#[async_trait]
impl StreamConnection for ScriptedConnection {
    async fn open_reader(&mut self) -> StreamResult<Box<dyn LineReader>> {
        let attempt = self.transport.counters.readers.fetch_add(1, Ordering::SeqCst) + 1;
        if self.transport.open_limit.is_some_and(|limit| attempt > limit) {
            return std::future::pending().await;
        }
        Ok(Box::new(ScriptedReader {
            transport: self.transport.clone(),
        }))
    }

    fn abort(&mut self) {
        self.transport.counters.aborts.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedReader {
    transport: ScriptedTransport,
}

#[async_trait]
impl LineReader for ScriptedReader {
    async fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        let step = self.transport.script.lock().pop_front();
        match step {
            Some(Step::Line(line)) => Ok(Some(line.to_string())),
            Some(Step::Silence) => Ok(None),
            Some(Step::Closed) => Err(TransportError::connection_closed("closed by peer")),
            Some(Step::Fail) => Err(TransportError::other("garbled chunk")),
            None => std::future::pending().await,
        }
    }
}

impl Drop for ScriptedReader {
    fn drop(&mut self) {
        self.transport
            .counters
            .readers_dropped
            .fetch_add(1, Ordering::SeqCst);
    }
}

type Received = Arc<Mutex<Vec<Option<String>>>>;

/// Dispatcher that records every call and stops on `stop_on`.
fn recorder(stop_on: Option<&'static str>) -> (Received, impl FnMut(Option<&str>) -> Flow + Send) {
    let received: Received = Arc::default();
    let sink = Arc::clone(&received);
    let dispatch = move |line: Option<&str>| {
        sink.lock().push(line.map(str::to_string));
        if line.is_some() && line == stop_on {
            Flow::Stop
        } else {
            Flow::Continue
        }
    };
    (received, dispatch)
}

async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

#[tokio::test]
async fn test_silence_escalates_then_gives_up_on_fourth() {
    init_test_tracing();
    let transport = ScriptedTransport::new(&[Step::Silence; 4]);
    let engine = StreamEngine::new();
    let (received, dispatch) = recorder(None);

    let result = engine
        .start_stream(Some(dispatch), || transport.connect())
        .await;

    assert!(result.is_ok());
    // initial + reconnect at the third silence
    assert_eq!(transport.counters.connections(), 2);
    // initial + reopen at the second + reopen after reconnect at the third
    assert_eq!(transport.counters.readers(), 3);
    assert!(received.lock().is_empty());
    assert_eq!(engine.state(), StreamState::Stop);
    assert_eq!(transport.counters.readers_dropped(), transport.counters.readers());
}

#[tokio::test]
async fn test_data_resets_the_silence_counter() {
    let transport = ScriptedTransport::new(&[
        Step::Silence,
        Step::Silence,
        Step::Silence,
        Step::Line("{\"id\":1}"),
        Step::Silence,
        Step::Silence,
        Step::Silence,
        Step::Silence,
    ]);
    let engine = StreamEngine::new();
    let (received, dispatch) = recorder(None);

    engine
        .start_stream(Some(dispatch), || transport.connect())
        .await
        .unwrap();

    assert_eq!(*received.lock(), vec![Some("{\"id\":1}".to_string())]);
    assert_eq!(transport.counters.connections(), 3);
    assert_eq!(transport.counters.readers(), 5);
}

#[tokio::test]
async fn test_lines_arrive_in_order_until_dispatcher_stops() {
    let transport = ScriptedTransport::new(&[
        Step::Line("a"),
        Step::Line("b"),
        Step::Line("c"),
        Step::Line("d"),
    ]);
    let engine = StreamEngine::new();
    let (received, dispatch) = recorder(Some("c"));

    engine
        .start_stream(Some(dispatch), || transport.connect())
        .await
        .unwrap();

    let lines: Vec<String> = received.lock().iter().flatten().cloned().collect();
    assert_eq!(lines, ["a", "b", "c"]);
    assert_eq!(engine.state(), StreamState::Stop);
    assert!(!engine.is_running());
    assert_eq!(transport.counters.aborts(), 1);
    assert_eq!(transport.counters.readers_dropped(), 1);
}

#[tokio::test]
async fn test_keep_alive_lines_are_not_dispatched() {
    let transport = ScriptedTransport::new(&[
        Step::Silence,
        Step::Line(""),
        Step::Silence,
        Step::Line("payload"),
    ]);
    let engine = StreamEngine::new();
    let (received, dispatch) = recorder(Some("payload"));

    engine
        .start_stream(Some(dispatch), || transport.connect())
        .await
        .unwrap();

    assert_eq!(*received.lock(), vec![Some("payload".to_string())]);
    // the keep-alive broke the silence run, so no escalation happened
    assert_eq!(transport.counters.readers(), 1);
}

#[tokio::test]
async fn test_closed_connection_reopens_reader_once() {
    let transport = ScriptedTransport::new(&[Step::Closed, Step::Line("after")]);
    let engine = StreamEngine::new();
    let (received, dispatch) = recorder(Some("after"));

    engine
        .start_stream(Some(dispatch), || transport.connect())
        .await
        .unwrap();

    assert_eq!(*received.lock(), vec![Some("after".to_string())]);
    assert_eq!(transport.counters.connections(), 1);
    assert_eq!(transport.counters.readers(), 2);
}

#[tokio::test]
async fn test_repeated_close_dispatches_none_and_ends() {
    let transport = ScriptedTransport::new(&[Step::Closed, Step::Closed, Step::Line("never")]);
    let engine = StreamEngine::new();
    let (received, dispatch) = recorder(None);

    let result = engine
        .start_stream(Some(dispatch), || transport.connect())
        .await;

    assert!(result.is_ok());
    assert_eq!(*received.lock(), vec![None]);
    assert_eq!(engine.state(), StreamState::Stop);
    assert_eq!(transport.counters.aborts(), 1);
}

#[tokio::test]
async fn test_other_read_errors_count_as_silence() {
    let transport = ScriptedTransport::new(&[Step::Fail; 4]);
    let engine = StreamEngine::new();
    let (received, dispatch) = recorder(None);

    engine
        .start_stream(Some(dispatch), || transport.connect())
        .await
        .unwrap();

    assert!(received.lock().is_empty());
    assert_eq!(transport.counters.connections(), 2);
    assert_eq!(transport.counters.readers(), 3);
}

#[tokio::test]
async fn test_stop_unblocks_a_pending_read() {
    init_test_tracing();
    let transport = ScriptedTransport::new(&[]);
    let engine = Arc::new(StreamEngine::new());
    let (received, dispatch) = recorder(None);

    let handle = {
        let engine = Arc::clone(&engine);
        let transport = transport.clone();
        tokio::spawn(async move {
            engine
                .start_stream(Some(dispatch), || transport.connect())
                .await
        })
    };

    eventually("the first reader", || transport.counters.readers() == 1).await;
    assert_eq!(engine.state(), StreamState::Resume);
    assert!(engine.is_running());

    engine.stop_stream();

    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("stream did not stop")
        .expect("stream task panicked");

    assert!(result.is_ok());
    assert_eq!(engine.state(), StreamState::Stop);
    assert!(!engine.is_running());
    assert_eq!(transport.counters.readers_dropped(), 1);
    assert_eq!(transport.counters.aborts(), 1);
    assert!(received.lock().is_empty());
}

#[tokio::test]
async fn test_stop_unblocks_a_pending_first_open() {
    let transport = ScriptedTransport::new(&[]).hang_opens_after(0);
    let engine = Arc::new(StreamEngine::new());
    let (received, dispatch) = recorder(None);

    let handle = {
        let engine = Arc::clone(&engine);
        let transport = transport.clone();
        tokio::spawn(async move {
            engine
                .start_stream(Some(dispatch), || transport.connect())
                .await
        })
    };

    eventually("the open attempt", || transport.counters.readers() == 1).await;
    engine.stop_stream();

    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("stream did not stop")
        .expect("stream task panicked");

    assert!(result.is_ok());
    assert_eq!(engine.state(), StreamState::Stop);
    assert!(!engine.is_running());
    assert_eq!(transport.counters.aborts(), 1);
    assert!(received.lock().is_empty());
}

#[tokio::test]
async fn test_stop_unblocks_a_pending_reopen() {
    let transport = ScriptedTransport::new(&[Step::Silence, Step::Silence]).hang_opens_after(1);
    let engine = Arc::new(StreamEngine::new());
    let (_, dispatch) = recorder(None);

    let handle = {
        let engine = Arc::clone(&engine);
        let transport = transport.clone();
        tokio::spawn(async move {
            engine
                .start_stream(Some(dispatch), || transport.connect())
                .await
        })
    };

    eventually("the reopen attempt", || transport.counters.readers() == 2).await;
    engine.stop_stream();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("stream did not stop")
        .expect("stream task panicked")
        .unwrap();

    assert!(!engine.is_running());
    assert_eq!(transport.counters.connections(), 1);
    assert_eq!(transport.counters.readers_dropped(), 1);
    assert_eq!(transport.counters.aborts(), 1);
}

#[tokio::test]
async fn test_dropping_the_stream_future_releases_the_connection() {
    let transport = ScriptedTransport::new(&[Step::Line("a")]);
    let engine = StreamEngine::new();
    let (received, dispatch) = recorder(None);

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        engine.start_stream(Some(dispatch), || transport.connect()),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(*received.lock(), vec![Some("a".to_string())]);
    assert_eq!(transport.counters.readers_dropped(), 1);
    assert_eq!(transport.counters.aborts(), 1);
    assert_eq!(engine.state(), StreamState::Stop);
    assert!(!engine.is_running());
}

#[tokio::test]
async fn test_second_start_is_rejected_while_running() {
    let first = ScriptedTransport::new(&[]);
    let second = ScriptedTransport::new(&[Step::Line("x")]);
    let engine = Arc::new(StreamEngine::new());
    let (_, dispatch) = recorder(None);

    let handle = {
        let engine = Arc::clone(&engine);
        let first = first.clone();
        tokio::spawn(async move { engine.start_stream(Some(dispatch), || first.connect()).await })
    };
    eventually("the first reader", || first.counters.readers() == 1).await;

    let (_, other_dispatch) = recorder(None);
    let result = engine
        .start_stream(Some(other_dispatch), || second.connect())
        .await;

    assert!(matches!(result, Err(StreamError::AlreadyRunning)));
    assert_eq!(second.counters.connections(), 0);
    // the running stream was left alone
    assert_eq!(first.counters.aborts(), 0);
    assert!(engine.is_running());
    assert_eq!(engine.state(), StreamState::Resume);

    engine.stop_stream();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_pause_holds_the_next_read_until_resume() {
    let transport = ScriptedTransport::new(&[Step::Line("a"), Step::Line("b")]);
    let engine = Arc::new(StreamEngine::new());
    let received: Received = Arc::default();

    let dispatch = {
        let engine = Arc::clone(&engine);
        let sink = Arc::clone(&received);
        move |line: Option<&str>| {
            sink.lock().push(line.map(str::to_string));
            match line {
                Some("a") => {
                    engine.pause_stream();
                    Flow::Continue
                }
                _ => Flow::Stop,
            }
        }
    };

    let handle = {
        let engine = Arc::clone(&engine);
        let transport = transport.clone();
        tokio::spawn(async move {
            engine
                .start_stream(Some(dispatch), || transport.connect())
                .await
        })
    };

    eventually("the first line", || received.lock().len() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(received.lock().len(), 1);
    assert_eq!(engine.state(), StreamState::Pause);

    engine.resume_stream();
    handle.await.unwrap().unwrap();

    let lines: Vec<String> = received.lock().iter().flatten().cloned().collect();
    assert_eq!(lines, ["a", "b"]);
}

#[tokio::test]
async fn test_stop_while_paused_ends_the_stream() {
    let transport = ScriptedTransport::new(&[Step::Line("a"), Step::Line("b")]);
    let engine = Arc::new(StreamEngine::new());
    let received: Received = Arc::default();

    let dispatch = {
        let engine = Arc::clone(&engine);
        let sink = Arc::clone(&received);
        move |line: Option<&str>| {
            sink.lock().push(line.map(str::to_string));
            engine.pause_stream();
            Flow::Continue
        }
    };

    let handle = {
        let engine = Arc::clone(&engine);
        let transport = transport.clone();
        tokio::spawn(async move {
            engine
                .start_stream(Some(dispatch), || transport.connect())
                .await
        })
    };

    eventually("the pause", || engine.state() == StreamState::Pause).await;
    engine.stop_stream();
    handle.await.unwrap().unwrap();

    assert_eq!(received.lock().len(), 1);
    assert_eq!(engine.state(), StreamState::Stop);
    assert_eq!(transport.counters.aborts(), 1);
}

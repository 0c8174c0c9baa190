//! Stream ingestion engine.
//!
//! One [`StreamEngine`] runs at most one stream at a time. `start_stream`
//! occupies its task for the life of the connection; the state setters may be
//! called from any other task or thread.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::{
    Flow, LineReader, StreamConnection, StreamError, StreamResult, StreamState, Transition,
    TransportError, TransportErrorKind,
};

/// What to do after a run of consecutive empty reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilenceAction {
    /// Treat as a transient gap and read again.
    Absorb,
    /// Drop the reader and reopen it over the same connection.
    ReopenReader,
    /// Abort the connection and build a new one through the factory.
    Reconnect,
    /// The feed is unreachable; end the stream.
    GiveUp,
}

impl SilenceAction {
    /// Escalation step for the `count`-th consecutive empty read.
    #[must_use]
    pub const fn for_count(count: u32) -> Self {
        match count {
            0 | 1 => Self::Absorb,
            2 => Self::ReopenReader,
            3 => Self::Reconnect,
            _ => Self::GiveUp,
        }
    }
}

/// Drives one streaming connection at a time.
#[derive(Debug)]
pub struct StreamEngine {
    state: watch::Sender<StreamState>,
    active: AtomicBool,
}

impl Default for StreamEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamEngine {
    /// Create an idle engine.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(StreamState::Stop);
        Self {
            state,
            active: AtomicBool::new(false),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// Whether a `start_stream` call is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Resume reading after a pause.
    pub fn resume_stream(&self) {
        self.transition(Transition::Resume);
    }

    /// Stop reading before the next line until resumed or stopped.
    pub fn pause_stream(&self) {
        self.transition(Transition::Pause);
    }

    /// Stop the stream. Interrupts a read that is currently pending, which
    /// closes the reader.
    pub fn stop_stream(&self) {
        self.transition(Transition::Stop);
    }

    /// Run a stream until it stops.
    ///
    /// `connect` builds a new connection; it is called once up front and
    /// again whenever the silence escalation decides to reconnect. `dispatch`
    /// receives every non-empty line in arrival order, and `None` once if the
    /// connection dies for good.
    ///
    /// Returns `Ok(())` on every in-loop exit: dispatcher stop, stop request,
    /// unreachable feed, or terminal transport failure. Errors are returned
    /// only for misuse and for failing to open the first connection.
    pub async fn start_stream<C, F, D>(&self, dispatch: Option<D>, mut connect: F) -> StreamResult<()>
    where
        C: StreamConnection,
        F: FnMut() -> StreamResult<C> + Send,
        D: FnMut(Option<&str>) -> Flow + Send,
    {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Refusing to start a second stream on a running engine");
            return Err(StreamError::AlreadyRunning);
        }
        let _running = RunningGuard { engine: self };

        let Some(mut dispatch) = dispatch else {
            return Err(StreamError::NoHandler);
        };

        self.transition(Transition::Start);
        let mut state_rx = self.state.subscribe();
        info!("Starting stream");

        let mut session = Session::new(connect()?);
        let result = match session.open(&mut state_rx).await {
            Ok(true) => {
                self.read_loop(&mut session, &mut state_rx, &mut dispatch, &mut connect)
                    .await;
                Ok(())
            }
            Ok(false) => {
                debug!("Stop requested while opening");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to open stream");
                Err(e)
            }
        };

        drop(session);
        info!("Stream closed");
        result
    }

    async fn read_loop<C, F, D>(
        &self,
        session: &mut Session<C>,
        state_rx: &mut watch::Receiver<StreamState>,
        dispatch: &mut D,
        connect: &mut F,
    ) where
        C: StreamConnection,
        F: FnMut() -> StreamResult<C> + Send,
        D: FnMut(Option<&str>) -> Flow + Send,
    {
        let mut silence = 0u32;

        loop {
            if wait_while_paused(state_rx).await == StreamState::Stop {
                debug!("Stop requested");
                break;
            }

            let step = match session.next_line(state_rx).await {
                Ok(Some(line)) => {
                    silence = 0;
                    self.deliver(&line, dispatch)
                }
                Ok(None) => {
                    silence += 1;
                    session.escalate(silence, state_rx, connect).await
                }
                Err(e) => match e.kind {
                    TransportErrorKind::Disposed => {
                        debug!("Reader closed by stop request");
                        ControlFlow::Break(())
                    }
                    TransportErrorKind::ConnectionClosed => {
                        warn!(error = %e, "Connection closed by peer, reopening reader");
                        self.recover_closed(session, state_rx, dispatch, &mut silence, connect)
                            .await
                    }
                    TransportErrorKind::Other => {
                        warn!(error = %e, "Read failed");
                        silence += 1;
                        session.escalate(silence, state_rx, connect).await
                    }
                },
            };

            if step.is_break() {
                break;
            }
        }
    }

    /// One reopen and one retried read after the peer closed the connection.
    async fn recover_closed<C, F, D>(
        &self,
        session: &mut Session<C>,
        state_rx: &mut watch::Receiver<StreamState>,
        dispatch: &mut D,
        silence: &mut u32,
        connect: &mut F,
    ) -> ControlFlow<()>
    where
        C: StreamConnection,
        F: FnMut() -> StreamResult<C> + Send,
        D: FnMut(Option<&str>) -> Flow + Send,
    {
        session.reopen_reader(state_rx).await;

        match session.next_line(state_rx).await {
            Ok(Some(line)) => {
                *silence = 0;
                self.deliver(&line, dispatch)
            }
            Ok(None) => {
                *silence += 1;
                session.escalate(*silence, state_rx, connect).await
            }
            Err(e) if e.kind == TransportErrorKind::ConnectionClosed => {
                error!(error = %e, "Unable to read from the stream after reopening");
                dispatch(None);
                ControlFlow::Break(())
            }
            Err(e) if e.kind == TransportErrorKind::Disposed => ControlFlow::Break(()),
            Err(e) => {
                warn!(error = %e, "Read failed after reopening");
                *silence += 1;
                session.escalate(*silence, state_rx, connect).await
            }
        }
    }

    fn deliver<D>(&self, line: &str, dispatch: &mut D) -> ControlFlow<()>
    where
        D: FnMut(Option<&str>) -> Flow,
    {
        if line.trim().is_empty() {
            trace!("Keep-alive");
            return ControlFlow::Continue(());
        }

        match dispatch(Some(line)) {
            Flow::Continue => ControlFlow::Continue(()),
            Flow::Stop => {
                debug!("Dispatcher requested stop");
                self.transition(Transition::Stop);
                ControlFlow::Break(())
            }
        }
    }

    fn transition(&self, transition: Transition) {
        self.state.send_if_modified(|state| {
            let next = state.apply(transition);
            if next == *state {
                return false;
            }
            debug!(from = %state, to = %next, "Stream state changed");
            *state = next;
            true
        });
    }
}

/// Releases the engine and forces `Stop` however `start_stream` exits,
/// including when its future is dropped. The connection itself is released
/// by dropping the [`Session`].
struct RunningGuard<'a> {
    engine: &'a StreamEngine,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.engine.state.send_replace(StreamState::Stop);
        self.engine.active.store(false, Ordering::Release);
    }
}

/// The connection handle and its current reader. Dropping it closes both.
struct Session<C: StreamConnection> {
    connection: C,
    reader: Option<Box<dyn LineReader>>,
}

impl<C: StreamConnection> Session<C> {
    const fn new(connection: C) -> Self {
        Self {
            connection,
            reader: None,
        }
    }

    /// Open the first reader. `Ok(false)` means a stop request won the race.
    async fn open(&mut self, state_rx: &mut watch::Receiver<StreamState>) -> StreamResult<bool> {
        match open_unless_stopped(&mut self.connection, state_rx).await {
            Some(reader) => {
                self.reader = Some(reader?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Read a line, or fail with `Disposed` as soon as a stop is requested.
    /// Without a reader there is nothing to read, which counts as silence.
    async fn next_line(
        &mut self,
        state_rx: &mut watch::Receiver<StreamState>,
    ) -> Result<Option<String>, TransportError> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        tokio::select! {
            biased;
            () = wait_for_stop(state_rx) => Err(TransportError::disposed()),
            line = reader.read_line() => line,
        }
    }

    async fn escalate<F>(
        &mut self,
        silence: u32,
        state_rx: &mut watch::Receiver<StreamState>,
        connect: &mut F,
    ) -> ControlFlow<()>
    where
        F: FnMut() -> StreamResult<C> + Send,
    {
        match SilenceAction::for_count(silence) {
            SilenceAction::Absorb => {
                debug!(silence, "No data received");
            }
            SilenceAction::ReopenReader => {
                warn!(silence, "No data received, reopening reader");
                self.reopen_reader(state_rx).await;
            }
            SilenceAction::Reconnect => {
                warn!(silence, "No data received, reconnecting");
                self.reconnect(state_rx, connect).await;
            }
            SilenceAction::GiveUp => {
                error!(silence, "Stream endpoint is not accessible");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Without a reader afterwards the next read counts as silence; after a
    /// stop the loop ends before reading.
    async fn reopen_reader(&mut self, state_rx: &mut watch::Receiver<StreamState>) {
        self.reader = None;
        match open_unless_stopped(&mut self.connection, state_rx).await {
            Some(Ok(reader)) => self.reader = Some(reader),
            Some(Err(e)) => warn!(error = %e, "Failed to reopen reader"),
            None => debug!("Stop requested while reopening"),
        }
    }

    async fn reconnect<F>(&mut self, state_rx: &mut watch::Receiver<StreamState>, connect: &mut F)
    where
        F: FnMut() -> StreamResult<C> + Send,
    {
        self.reader = None;
        self.connection.abort();

        match connect() {
            Ok(connection) => {
                self.connection = connection;
                self.reopen_reader(state_rx).await;
            }
            Err(e) => warn!(error = %e, "Failed to build a new connection"),
        }
    }}

impl<C: StreamConnection> Drop for Session<C> {
    fn drop(&mut self) {
        self.reader = None;
        self.connection.abort();
    }
}

/// Open a reader, or `None` as soon as a stop is requested.
async fn open_unless_stopped<C: StreamConnection>(
    connection: &mut C,
    state_rx: &mut watch::Receiver<StreamState>,
) -> Option<StreamResult<Box<dyn LineReader>>> {
    tokio::select! {
        biased;
        () = wait_for_stop(state_rx) => None,
        opened = connection.open_reader() => Some(opened),
    }
}

/// Resolves once the state is `Stop`.
async fn wait_for_stop(state_rx: &mut watch::Receiver<StreamState>) {
    loop {
        if *state_rx.borrow_and_update() == StreamState::Stop {
            return;
        }
        if state_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Blocks while paused; returns the first non-paused state.
async fn wait_while_paused(state_rx: &mut watch::Receiver<StreamState>) -> StreamState {
    loop {
        let state = *state_rx.borrow_and_update();
        if state != StreamState::Pause {
            return state;
        }
        debug!("Stream paused");
        if state_rx.changed().await.is_err() {
            return StreamState::Stop;
        }
    }
}

//! Async playthrough host.
//!
//! A single tokio task owns the `Session`. Callers talk to it over an mpsc
//! channel with oneshot replies and observe it through a `watch` channel.
//!
//! Source updates do not evaluate. Each one pushes the quiescence deadline
//! out again; when the deadline passes with no newer update the task applies
//! `evaluate`. Submitting a mission flushes a pending evaluation first.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use codecase_engine::commands::Command;
use codecase_engine::domain::{HintRecord, Phase, ProgressionState, Transition, ValidationVerdict};

use crate::error::RuntimeError;
use crate::session::Session;

const REQUEST_QUEUE: usize = 64;

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaythroughView {
    pub state: ProgressionState,
    pub verdict: Option<ValidationVerdict>,
    pub hint: Option<HintRecord>,
    pub sequence: u64,
}

impl PlaythroughView {
    fn of(session: &Session) -> Self {
        Self {
            state: session.state().clone(),
            verdict: session.verdict().cloned(),
            hint: session.hint(),
            sequence: session.current_sequence(),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, RuntimeError>>;

enum Request {
    Apply { command: Command, reply: Reply<Transition> },
    Flush { reply: Reply<Option<Transition>> },
    Stop { discard: bool, reply: Reply<()> },
}

/// Cloneable handle to a running playthrough task.
#[derive(Debug, Clone)]
pub struct PlaythroughHandle {
    tx: mpsc::Sender<Request>,
    view: watch::Receiver<PlaythroughView>,
}

impl PlaythroughHandle {
    /// Move `session` onto its own task.
    pub fn spawn(session: Session, quiescence: Duration) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
        let (view_tx, view) = watch::channel(PlaythroughView::of(&session));
        let worker = Worker {
            session,
            rx,
            view_tx,
            quiescence,
            deadline: None,
        };
        let task = tokio::spawn(worker.run());
        (Self { tx, view }, task)
    }

    pub async fn apply(&self, command: Command) -> Result<Transition, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Apply { command, reply }).await?;
        rx.await.map_err(|_| RuntimeError::Closed)?
    }

    /// Replace the source text and restart the quiescence timer.
    pub async fn update_source(
        &self,
        html: impl Into<String>,
        css: impl Into<String>,
    ) -> Result<Transition, RuntimeError> {
        self.apply(Command::UpdateSource {
            html: html.into(),
            css: css.into(),
        })
        .await
    }

    /// Run a pending evaluation now. None when nothing was pending.
    pub async fn flush(&self) -> Result<Option<Transition>, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Flush { reply }).await?;
        rx.await.map_err(|_| RuntimeError::Closed)?
    }

    /// Flush, then complete the current mission and advance.
    pub async fn submit(&self) -> Result<Transition, RuntimeError> {
        self.apply(Command::CompleteAndAdvance).await
    }

    /// Latest published view.
    pub fn view(&self) -> PlaythroughView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaythroughView> {
        self.view.clone()
    }

    /// Stop the task and keep the journal for a later resume.
    pub async fn close(self) -> Result<(), RuntimeError> {
        self.stop(false).await
    }

    /// Stop the task and delete the journal: the learner left the case.
    pub async fn exit(self) -> Result<(), RuntimeError> {
        self.stop(true).await
    }

    async fn stop(self, discard: bool) -> Result<(), RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Stop { discard, reply }).await?;
        rx.await.map_err(|_| RuntimeError::Closed)?
    }

    async fn send(&self, request: Request) -> Result<(), RuntimeError> {
        self.tx.send(request).await.map_err(|_| RuntimeError::Closed)
    }
}

struct Worker {
    session: Session,
    rx: mpsc::Receiver<Request>,
    view_tx: watch::Sender<PlaythroughView>,
    quiescence: Duration,
    deadline: Option<Instant>,
}

impl Worker {
    async fn run(mut self) {
        let stop = loop {
            let deadline = self.deadline;
            tokio::select! {
                request = self.rx.recv() => match request {
                    Some(Request::Stop { discard, reply }) => break Some((discard, reply)),
                    Some(request) => self.handle(request),
                    None => break None,
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Err(err) = self.evaluate_pending() {
                        warn!(error = %err, "scheduled evaluation failed");
                    }
                }
            }
        };

        if let Some((discard, reply)) = stop {
            let result = if discard {
                self.session.discard()
            } else {
                Ok(())
            };
            let _ = reply.send(result);
        }
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::Apply { command, reply } => {
                let _ = reply.send(self.apply(command));
            }
            Request::Flush { reply } => {
                let _ = reply.send(self.evaluate_pending());
            }
            Request::Stop { .. } => {}
        }
    }

    fn apply(&mut self, command: Command) -> Result<Transition, RuntimeError> {
        match &command {
            Command::UpdateSource { .. } => {
                let transition = self.commit(command)?;
                self.deadline = Some(Instant::now() + self.quiescence);
                debug!(quiescence_ms = self.quiescence.as_millis() as u64, "evaluation rescheduled");
                Ok(transition)
            }
            Command::Evaluate => {
                self.deadline = None;
                self.commit(command)
            }
            Command::CompleteAndAdvance => {
                self.evaluate_pending()?;
                self.commit(command)
            }
            _ => self.commit(command),
        }
    }

    /// Apply `evaluate` if a deadline is pending and the playthrough is still
    /// in a task.
    fn evaluate_pending(&mut self) -> Result<Option<Transition>, RuntimeError> {
        if self.deadline.take().is_none() {
            return Ok(None);
        }
        if self.session.state().phase != Phase::Task {
            return Ok(None);
        }
        self.commit(Command::Evaluate).map(Some)
    }

    fn commit(&mut self, command: Command) -> Result<Transition, RuntimeError> {
        let transition = self.session.apply(command)?;
        self.view_tx.send_replace(PlaythroughView::of(&self.session));
        Ok(transition)
    }
}

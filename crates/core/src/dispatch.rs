//! Execution context and delivery loop.
//!
//! Producing a packet and delivering it are decoupled: senders
//! [`post`](ExecutionContext::post) an owned [`Message`] and return at once;
//! the context's loop later hands it to its [`MessageHandler`] exactly once,
//! in posting order, and drops the payload when the handler returns.
//!
//! The loop is cooperative. Tests usually drive it by hand with
//! [`process_pending`](ExecutionContext::process_pending); production code
//! runs it on a dedicated thread with [`spawn`](ExecutionContext::spawn).
//!
//! At most one spawned loop drains a context at a time, which keeps
//! delivery in posting order.
//!
//! Handlers are referenced weakly. A message whose handler has been dropped
//! by drain time is consumed without a callback.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::buffer::Buffer;
use crate::error::{Result, TransportError};
use crate::packet::PacketKind;

/// How long an idle loop sleeps before re-checking its running flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A posted packet together with its class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: PacketKind,
    pub data: Buffer,
}

impl Message {
    pub fn new(kind: PacketKind, data: Buffer) -> Self {
        Self { kind, data }
    }
}

/// Target of posted messages.
pub trait MessageHandler: Send + Sync {
    /// Called once per message on the context's loop. The message is
    /// dropped when this returns.
    fn on_message(&self, message: Message);
}

struct Envelope {
    handler: Weak<dyn MessageHandler>,
    message: Message,
}

#[derive(Default)]
struct Queue {
    messages: Mutex<VecDeque<Envelope>>,
    ready: Condvar,
    /// Set while a spawned loop owns the queue.
    draining: AtomicBool,
}

/// Handle to a FIFO message queue and its delivery loop.
///
/// Cloning the handle shares the queue.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    queue: Arc<Queue>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `message` for `handler`. Never waits for delivery.
    ///
    /// The queue is unbounded: messages accumulate until a loop drains them
    /// or their handler is [`clear`](Self::clear)ed.
    pub fn post(&self, handler: Weak<dyn MessageHandler>, message: Message) {
        self.queue
            .messages
            .lock()
            .push_back(Envelope { handler, message });
        self.queue.ready.notify_one();
    }

    /// Number of messages waiting to be delivered.
    pub fn pending(&self) -> usize {
        self.queue.messages.lock().len()
    }

    /// Deliver the oldest queued message, if any.
    ///
    /// The queue lock is released before the handler runs, so handlers may
    /// post further messages.
    pub fn process_one(&self) -> bool {
        let Some(envelope) = self.queue.messages.lock().pop_front() else {
            return false;
        };
        match envelope.handler.upgrade() {
            Some(handler) => handler.on_message(envelope.message),
            None => {
                tracing::trace!(kind = %envelope.message.kind, "handler gone, message discarded");
            }
        }
        true
    }

    /// Deliver the messages queued at the time of the call.
    ///
    /// Messages posted by handlers during this drain wait for the next one.
    /// Returns how many messages were consumed.
    pub fn process_pending(&self) -> usize {
        let queued = self.pending();
        let mut processed = 0;
        while processed < queued && self.process_one() {
            processed += 1;
        }
        processed
    }

    /// Discard every queued message addressed to `handler`.
    ///
    /// Used when the handler is torn down. Returns the number discarded.
    pub fn clear(&self, handler: &Weak<dyn MessageHandler>) -> usize {
        let mut messages = self.queue.messages.lock();
        let before = messages.len();
        messages.retain(|e| !Weak::ptr_eq(&e.handler, handler));
        before - messages.len()
    }

    /// Run the delivery loop on a dedicated thread until the returned
    /// [`ContextThread`] is stopped or dropped.
    ///
    /// Fails with [`TransportError::AlreadyRunning`] while another spawned
    /// loop is draining this context.
    pub fn spawn(&self) -> Result<ContextThread> {
        if self
            .queue
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TransportError::AlreadyRunning);
        }

        let running = Arc::new(AtomicBool::new(true));
        let context = self.clone();
        let r = running.clone();
        let handle = match thread::Builder::new()
            .name("rtp-dispatch".to_string())
            .spawn(move || context.run(&r))
        {
            Ok(handle) => handle,
            Err(e) => {
                self.queue.draining.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        tracing::debug!("delivery loop started");
        Ok(ContextThread {
            context: self.clone(),
            running,
            handle: Some(handle),
        })
    }

    fn run(&self, running: &AtomicBool) {
        while running.load(Ordering::SeqCst) {
            if !self.process_one() {
                self.wait(POLL_INTERVAL);
            }
        }
        tracing::debug!(pending = self.pending(), "delivery loop exited");
    }

    fn wait(&self, timeout: Duration) {
        let mut messages = self.queue.messages.lock();
        if messages.is_empty() {
            self.queue.ready.wait_for(&mut messages, timeout);
        }
    }
}

/// A delivery loop running on its own thread.
///
/// Dropping it stops the loop and joins the thread. Messages still queued
/// stay in the context and can be drained later.
pub struct ContextThread {
    context: ExecutionContext,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ContextThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextThread")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl ContextThread {
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.context.queue.ready.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("delivery loop panicked");
            }
            self.context.queue.draining.store(false, Ordering::SeqCst);
        }
    }
}

impl Drop for ContextThread {
    fn drop(&mut self) {
        self.stop();
    }
}

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace, warn};

use crate::prefs::{Prefs, PrefsStore};
use crate::probes::{ConnectivityProbe, IdentityProbe};
use crate::sink::PresentationSink;
use crate::types::{Command, ControlCommand, Notification};

/// Default bound on queued notifications, counting the one on screen.
pub const DEFAULT_QUEUE_CAP: usize = 50;

/// Mutable scheduler state. The displayed notification stays at the queue
/// head until its completion signal, so `showing` duplicates the head
/// rather than owning it exclusively.
#[derive(Debug)]
struct State {
    paused: bool,
    prefs: Prefs,
    queue: VecDeque<Notification>,
    showing: Option<Notification>,
    reminders_injected: bool,
}

/// The display state machine: admission policy, FIFO queue, pause flag, and
/// sequential hand-off to the presentation sink.
///
/// Every operation takes the single state lock for its full duration and
/// only enqueues work with the sink, so none of them blocks on display
/// activity. Completion signals arrive on the sink's own thread and take
/// the same lock: the sink reports each display exactly once, so a signal
/// racing an intake operation has to wait its turn rather than be dropped.
pub struct Scheduler {
    state: Mutex<State>,
    sink: Arc<dyn PresentationSink>,
    prefs_store: PrefsStore,
    connectivity: Box<dyn ConnectivityProbe>,
    identity: Box<dyn IdentityProbe>,
    queue_cap: usize,
    reminder: Notification,
}

impl Scheduler {
    /// Builds the scheduler, loading the persisted preferences from
    /// `prefs_store` as the starting toggle state.
    pub fn new(
        sink: Arc<dyn PresentationSink>,
        prefs_store: PrefsStore,
        connectivity: Box<dyn ConnectivityProbe>,
        identity: Box<dyn IdentityProbe>,
        queue_cap: usize,
        reminder: Notification,
    ) -> Self {
        let prefs = prefs_store.load();
        Self {
            state: Mutex::new(State {
                paused: false,
                prefs,
                queue: VecDeque::new(),
                showing: None,
                reminders_injected: false,
            }),
            sink,
            prefs_store,
            connectivity,
            identity,
            queue_cap,
            reminder,
        }
    }

    /// Dispatches one parsed command.
    pub fn apply(&self, command: Command) {
        match command {
            Command::Control(control) => self.handle_control(control),
            Command::Notify(notification) => self.admit(*notification),
        }
    }

    /// Applies a control directive. Preference changes are written back to
    /// the store immediately; a failed write keeps the in-memory state.
    pub fn handle_control(&self, control: ControlCommand) {
        let mut state = self.lock();
        debug!(command = %control, "applying control");
        match control {
            ControlCommand::Enable => {
                state.prefs.enabled = true;
                self.persist(&state.prefs);
            }
            // Disabling only gates future admissions. The queue and any
            // active display are left alone.
            ControlCommand::Disable => {
                state.prefs.enabled = false;
                self.persist(&state.prefs);
            }
            ControlCommand::AllowWorldNotifications => {
                state.prefs.allow_world_notifications = true;
                self.persist(&state.prefs);
            }
            ControlCommand::DisallowWorldNotifications => {
                state.prefs.allow_world_notifications = false;
                self.persist(&state.prefs);
            }
            ControlCommand::Pause => state.paused = true,
            ControlCommand::Resume => {
                state.paused = false;
                // Resume is the one display trigger without a fresh
                // admission.
                if state.showing.is_none() {
                    self.display_head(&mut state);
                }
            }
        }
    }

    /// Admission: drops are silent because the pipe is one-way.
    pub fn admit(&self, notification: Notification) {
        let mut state = self.lock();
        if !state.prefs.enabled {
            debug!(title = %notification.title, "dropped, notifications disabled");
            return;
        }
        if notification.kind.is_world() && !state.prefs.allow_world_notifications {
            debug!(title = %notification.title, "dropped, world notifications disallowed");
            return;
        }
        if state.queue.len() >= self.queue_cap {
            warn!(
                title = %notification.title,
                cap = self.queue_cap,
                "dropped, queue full"
            );
            return;
        }

        debug!(title = %notification.title, kind = %notification.kind.as_str(), "queued");
        state.queue.push_back(notification);
        if !state.paused && state.showing.is_none() {
            self.display_head(&mut state);
        }
    }

    /// Handles the sink's completion signal for the notification on screen.
    ///
    /// Delivered from the sink's own thread, exactly once per display, so
    /// it waits for the state lock when an intake operation holds it; a
    /// dropped signal would leave `showing` occupied for a toast that no
    /// longer exists. A signal with nothing showing is a no-op, making
    /// duplicate deliveries harmless.
    pub fn on_dismissed_or_timed_out(&self) {
        let mut state = self.lock();
        if state.showing.is_none() {
            trace!("completion signal with nothing showing");
            return;
        }

        self.sink.hide();
        state.showing = None;
        if let Some(finished) = state.queue.pop_front() {
            debug!(title = %finished.title, "notification finished");
        }

        if state.queue.front().is_some() {
            // The drain keeps going even while paused. Pausing holds fresh
            // admissions at the queue, not notifications already in flight.
            self.display_head(&mut state);
        } else if state.reminders_injected {
            state.reminders_injected = false;
        } else {
            // Alternating cycle: one reminder pass per emptied queue, then
            // one quiet pass. The flag flips even when the pass injects
            // nothing.
            state.reminders_injected = true;
            self.inject_reminders(&mut state);
        }
    }

    /// Queue length including the displayed head.
    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn currently_showing(&self) -> Option<Notification> {
        self.lock().showing.clone()
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn prefs(&self) -> Prefs {
        self.lock().prefs
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, prefs: &Prefs) {
        if let Err(err) = self.prefs_store.save(prefs) {
            warn!(error = %err, "failed to persist preferences");
        }
    }

    fn display_head(&self, state: &mut State) {
        if let Some(head) = state.queue.front() {
            debug!(title = %head.title, "displaying");
            state.showing = Some(head.clone());
            self.sink.show(head);
        }
    }

    /// Queues the registration reminder for users who are online but have
    /// not registered. Bypasses the enabled and world gates: the reminder is
    /// first-party and not a world broadcast.
    fn inject_reminders(&self, state: &mut State) {
        if !self.connectivity.is_online() {
            debug!("offline, skipping registration reminder");
            return;
        }
        if self.identity.is_registered() {
            return;
        }

        debug!("queueing registration reminder");
        state.queue.push_back(self.reminder.clone());
        if state.showing.is_none() {
            self.display_head(state);
        }
    }
}

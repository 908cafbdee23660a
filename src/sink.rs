use std::time::{Duration, Instant};

use async_channel::{Receiver, Sender};
use notify_rust::{Hint, Notification as Toast, Timeout as LibTimeout, Urgency as LibUrgency};
use tracing::{debug, trace, warn};

use crate::error::SinkError;
use crate::types::{Kind, Notification};

/// Completion signal for one displayed notification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SinkSignal {
    /// The user closed or interacted with the notification.
    Dismissed,
    /// The display period elapsed without interaction.
    TimedOut,
}

/// Display surface the scheduler drives.
///
/// `show` must hand the work off and return immediately; the scheduler calls
/// it with its state lock held. Exactly one completion signal is reported per
/// shown notification, even when delivery fails.
pub trait PresentationSink: Send + Sync {
    fn show(&self, notification: &Notification);
    fn hide(&self);
}

const DEFAULT_KEY: &str = "default";
const BUTTON1_KEY: &str = "button1";
const BUTTON2_KEY: &str = "button2";

/// Renders notifications as desktop toasts and reports completions on an
/// async channel.
pub struct DesktopSink {
    appname: String,
    timeout: Duration,
    signals: Sender<SinkSignal>,
}

impl DesktopSink {
    /// Builds the sink together with the receiving end of its completion
    /// channel.
    pub fn new(appname: impl Into<String>, timeout: Duration) -> (Self, Receiver<SinkSignal>) {
        let (signals, completions) = async_channel::bounded(16);
        (
            Self {
                appname: appname.into(),
                timeout,
                signals,
            },
            completions,
        )
    }
}

impl PresentationSink for DesktopSink {
    fn show(&self, notification: &Notification) {
        let notification = notification.clone();
        let appname = self.appname.clone();
        let timeout = self.timeout;
        let signals = self.signals.clone();

        tokio::task::spawn_blocking(move || {
            let shown_at = Instant::now();
            let signal = match deliver(&notification, &appname, timeout) {
                // The close callback does not carry the server's reason, so
                // expiry is inferred from elapsed display time.
                Ok(false) if shown_at.elapsed() >= timeout => SinkSignal::TimedOut,
                Ok(_) => SinkSignal::Dismissed,
                Err(err) => {
                    warn!(error = %err, title = %notification.title, "toast delivery failed");
                    SinkSignal::Dismissed
                }
            };
            debug!(?signal, elapsed = ?shown_at.elapsed(), "display finished");
            if signals.send_blocking(signal).is_err() {
                debug!("completion receiver gone, dropping signal");
            }
        });
    }

    fn hide(&self) {
        // The server has already torn the toast down by the time the close
        // signal arrives.
        trace!("hide requested");
    }
}

/// Shows the toast and blocks until the server reports an action or a close.
/// Returns whether the user invoked an action.
fn deliver(
    notification: &Notification,
    appname: &str,
    timeout: Duration,
) -> Result<bool, SinkError> {
    let handle = build_toast(notification, appname, timeout)
        .show()
        .map_err(|source| SinkError::Backend { source })?;

    let mut activated = false;
    handle.wait_for_action(|action| match action {
        DEFAULT_KEY => {
            debug!(command = ?notification.command, "notification activated");
            activated = true;
        }
        BUTTON1_KEY | BUTTON2_KEY => {
            let index = usize::from(action == BUTTON2_KEY);
            let command = notification
                .buttons
                .get(index)
                .and_then(|b| b.command.as_deref());
            debug!(action, ?command, "notification button pressed");
            activated = true;
        }
        "__closed" | "__timeout" => {}
        other => trace!(action = other, "unhandled toast action"),
    });
    Ok(activated)
}

fn build_toast(notification: &Notification, appname: &str, timeout: Duration) -> Toast {
    let mut builder = Toast::new();
    builder
        .summary(&notification.title)
        .body(&notification.byline)
        .appname(appname)
        .urgency(map_urgency(&notification.kind))
        .timeout(map_timeout(timeout));

    if let Some(image) = notification.image.as_deref() {
        builder.icon(&image.to_string_lossy());
    }
    if let Some(sound) = notification.sound.as_deref() {
        builder.hint(Hint::SoundFile(sound.to_string_lossy().into_owned()));
    }
    if notification.command.is_some() {
        builder.action(DEFAULT_KEY, "Open");
    }
    for (key, button) in [BUTTON1_KEY, BUTTON2_KEY].into_iter().zip(&notification.buttons) {
        builder.action(key, &button.label);
    }
    builder
}

fn map_urgency(kind: &Kind) -> LibUrgency {
    match kind {
        Kind::Small => LibUrgency::Low,
        _ => LibUrgency::Normal,
    }
}

fn map_timeout(timeout: Duration) -> LibTimeout {
    LibTimeout::Milliseconds(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX))
}

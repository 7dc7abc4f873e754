//! Per-identity alerting for recognized faces.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use facedb_store::{Ingested, UNKNOWN_LABEL};
use thiserror::Error;

/// Minimum time between two alerts for the same identity.
pub const DEFAULT_NOTIFY_COOLDOWN: Duration = Duration::from_secs(3600);

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// One recognized face, as handed to a [`Notifier`].
#[derive(Debug, Clone)]
pub struct Detection {
    pub global_id: String,
    pub label: String,
    pub confidence: f32,
    pub image: PathBuf,
}

impl Detection {
    pub fn from_ingested(ingested: &Ingested, image: PathBuf) -> Self {
        Self {
            global_id: ingested.record.global_id.clone(),
            label: ingested.record.label.clone(),
            confidence: ingested.similarity,
            image,
        }
    }

    /// Human-readable alert text. Unnamed faces are shown by id.
    pub fn caption(&self) -> String {
        let name = if self.label == UNKNOWN_LABEL {
            &self.global_id
        } else {
            &self.label
        };
        format!("Detected {name} (confidence: {:.2})", self.confidence)
    }
}

/// Delivers alerts somewhere.
pub trait Notifier: Send {
    fn notify(&self, detection: &Detection) -> Result<(), NotifyError>;
}

/// Writes alerts to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, detection: &Detection) -> Result<(), NotifyError> {
        tracing::info!(
            global_id = %detection.global_id,
            image = %detection.image.display(),
            "{}",
            detection.caption()
        );
        Ok(())
    }
}

/// Runs an external program per alert as `program <caption> <image>`,
/// e.g. a script that forwards to a messaging service.
pub struct CommandNotifier {
    program: PathBuf,
}

impl CommandNotifier {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, detection: &Detection) -> Result<(), NotifyError> {
        let status = Command::new(&self.program)
            .arg(detection.caption())
            .arg(&detection.image)
            .env("FACEDB_GLOBAL_ID", &detection.global_id)
            .status()
            .map_err(|e| NotifyError::Delivery(format!("{}: {e}", self.program.display())))?;
        if !status.success() {
            return Err(NotifyError::Delivery(format!(
                "{} exited with {status}",
                self.program.display()
            )));
        }
        Ok(())
    }
}

/// Rate limiter: at most one alert per identity per cooldown.
#[derive(Debug)]
pub struct CooldownGate {
    cooldown: i64,
    last_sent: HashMap<String, i64>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: i64::try_from(cooldown.as_secs()).unwrap_or(i64::MAX),
            last_sent: HashMap::new(),
        }
    }

    /// True if `global_id` may be alerted at `now` (epoch seconds). More
    /// than a full cooldown must have passed since the last alert. A true
    /// answer starts a new cooldown for that identity.
    pub fn should_notify(&mut self, global_id: &str, now: i64) -> bool {
        if let Some(&last) = self.last_sent.get(global_id) {
            if now.saturating_sub(last) <= self.cooldown {
                return false;
            }
        }
        self.last_sent.insert(global_id.to_string(), now);
        true
    }

    /// Drop entries whose cooldown has expired.
    pub fn prune(&mut self, now: i64) {
        let cooldown = self.cooldown;
        self.last_sent
            .retain(|_, last| now.saturating_sub(*last) <= cooldown);
    }

    pub fn tracked(&self) -> usize {
        self.last_sent.len()
    }
}

/// A cooldown gate in front of a notifier.
pub struct Alerts {
    gate: CooldownGate,
    notifier: Box<dyn Notifier>,
}

impl Alerts {
    pub fn new(gate: CooldownGate, notifier: Box<dyn Notifier>) -> Self {
        Self { gate, notifier }
    }

    /// Alert on a detection unless its identity is cooling down. Delivery
    /// failures are logged, never raised. Returns whether an alert went out.
    pub fn observe(&mut self, detection: &Detection, now: i64) -> bool {
        if !self.gate.should_notify(&detection.global_id, now) {
            tracing::trace!(global_id = %detection.global_id, "alert suppressed by cooldown");
            return false;
        }
        match self.notifier.notify(detection) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(global_id = %detection.global_id, error = %e, "alert failed");
                false
            }
        }
    }

    pub fn gate_mut(&mut self) -> &mut CooldownGate {
        &mut self.gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn detection(global_id: &str, label: &str, confidence: f32) -> Detection {
        Detection {
            global_id: global_id.into(),
            label: label.into(),
            confidence,
            image: PathBuf::from("/tmp/crop.jpg"),
        }
    }

    /// Records captions instead of sending them.
    struct Recording(Arc<Mutex<Vec<String>>>);

    impl Notifier for Recording {
        fn notify(&self, detection: &Detection) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(detection.caption());
            Ok(())
        }
    }

    struct Failing;

    impl Notifier for Failing {
        fn notify(&self, _: &Detection) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("offline".into()))
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_command_notifier() {
        let d = detection("a", "Alice", 0.9);
        assert!(CommandNotifier::new("true").notify(&d).is_ok());
        assert!(CommandNotifier::new("false").notify(&d).is_err());
        assert!(CommandNotifier::new("/nonexistent/notify").notify(&d).is_err());
    }

    #[test]
    fn test_caption() {
        assert_eq!(
            detection("abc", "Alice", 0.876).caption(),
            "Detected Alice (confidence: 0.88)"
        );
        assert_eq!(
            detection("abc", UNKNOWN_LABEL, 0.5).caption(),
            "Detected abc (confidence: 0.50)"
        );
    }

    #[test]
    fn test_gate_cooldown() {
        let mut gate = CooldownGate::new(Duration::from_secs(60));
        assert!(gate.should_notify("a", 0));
        assert!(!gate.should_notify("a", 59));
        assert!(gate.should_notify("b", 30));
        assert!(!gate.should_notify("a", 60));
        assert!(gate.should_notify("a", 61));
        assert!(!gate.should_notify("a", 100));
    }

    #[test]
    fn test_gate_prune() {
        let mut gate = CooldownGate::new(Duration::from_secs(10));
        gate.should_notify("a", 0);
        gate.should_notify("b", 5);
        gate.prune(12);
        assert_eq!(gate.tracked(), 1);
        // Still cooling down at exactly the cooldown.
        gate.prune(15);
        assert_eq!(gate.tracked(), 1);
        gate.prune(16);
        assert_eq!(gate.tracked(), 0);
    }

    #[test]
    fn test_alerts_rate_limited() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut alerts = Alerts::new(
            CooldownGate::new(DEFAULT_NOTIFY_COOLDOWN),
            Box::new(Recording(sent.clone())),
        );

        assert!(alerts.observe(&detection("a", "Alice", 0.9), 1000));
        assert!(!alerts.observe(&detection("a", "Alice", 0.95), 1500));
        assert!(!alerts.observe(&detection("a", "Alice", 0.95), 1000 + 3600));
        assert!(alerts.observe(&detection("a", "Alice", 0.95), 1000 + 3601));
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_delivery_not_raised() {
        let mut alerts = Alerts::new(CooldownGate::new(DEFAULT_NOTIFY_COOLDOWN), Box::new(Failing));
        assert!(!alerts.observe(&detection("a", "Alice", 0.9), 0));
    }
}

// Toast center - Alert deduplication and the visible toast list
use crate::domain::telemetry::{AlertNotice, Severity};
use crate::domain::toast::ToastAlert;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ToastPolicy {
    pub cooldown: Duration,
    pub display_for: Duration,
    pub history_limit: usize,
}

impl Default for ToastPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(10),
            display_for: Duration::from_secs(5),
            history_limit: 50,
        }
    }
}

#[derive(Debug)]
pub struct ToastCenter {
    policy: ToastPolicy,
    last_shown: HashMap<(String, String), Instant>,
    visible: VecDeque<ToastAlert>,
    next_id: u64,
}

impl ToastCenter {
    pub fn new(policy: ToastPolicy) -> Self {
        Self {
            policy,
            last_shown: HashMap::new(),
            visible: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Offer the alerts of one tick. At most one toast is raised per call.
    pub fn offer(&mut self, alerts: &[AlertNotice], now: Instant) -> Option<ToastAlert> {
        let top = top_alert(alerts)?;
        let key = (top.title.clone(), top.message.clone());

        if let Some(shown) = self.last_shown.get(&key) {
            if now.saturating_duration_since(*shown) < self.policy.cooldown {
                tracing::trace!(title = %top.title, "suppressing duplicate toast");
                return None;
            }
        }

        self.forget_cooled_down(now);
        self.last_shown.insert(key, now);

        let expires_at = match top.severity {
            Severity::Critical => None,
            _ => Some(now + self.policy.display_for),
        };
        let toast = ToastAlert {
            id: self.next_id,
            severity: top.severity,
            title: top.title.clone(),
            message: top.message.clone(),
            expires_at,
        };
        self.next_id += 1;

        self.visible.push_back(toast.clone());
        while self.visible.len() > self.policy.history_limit.max(1) {
            self.visible.pop_front();
        }

        Some(toast)
    }

    /// Visible toasts after dropping expired ones.
    pub fn active(&mut self, now: Instant) -> Vec<ToastAlert> {
        self.visible.retain(|toast| !toast.is_expired(now));
        self.visible.iter().cloned().collect()
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.visible.len();
        self.visible.retain(|toast| toast.id != id);
        self.visible.len() != before
    }

    fn forget_cooled_down(&mut self, now: Instant) {
        let cooldown = self.policy.cooldown;
        self.last_shown
            .retain(|_, shown| now.saturating_duration_since(*shown) < cooldown);
    }
}

/// Critical entries ahead of warnings, original order kept within each group.
fn top_alert(alerts: &[AlertNotice]) -> Option<&AlertNotice> {
    alerts
        .iter()
        .find(|alert| alert.severity == Severity::Critical)
        .or_else(|| alerts.iter().find(|alert| alert.severity == Severity::Warning))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(title: &str, message: &str) -> AlertNotice {
        AlertNotice::new(Severity::Warning, title, message)
    }

    fn critical(title: &str, message: &str) -> AlertNotice {
        AlertNotice::new(Severity::Critical, title, message)
    }

    #[test]
    fn test_duplicate_within_cooldown_is_suppressed() {
        let mut center = ToastCenter::new(ToastPolicy::default());
        let alerts = vec![warning("High Temperature", "Core temperature high: 62.0°C")];
        let t0 = Instant::now();

        assert!(center.offer(&alerts, t0).is_some());
        assert!(center.offer(&alerts, t0 + Duration::from_secs(2)).is_none());
    }

    #[test]
    fn test_duplicate_after_cooldown_is_shown_again() {
        let mut center = ToastCenter::new(ToastPolicy::default());
        let alerts = vec![warning("High Temperature", "Core temperature high: 62.0°C")];
        let t0 = Instant::now();

        assert!(center.offer(&alerts, t0).is_some());
        assert!(center.offer(&alerts, t0 + Duration::from_secs(11)).is_some());
    }

    #[test]
    fn test_different_message_is_not_a_duplicate() {
        let mut center = ToastCenter::new(ToastPolicy::default());
        let t0 = Instant::now();

        assert!(center.offer(&[warning("Low RUL", "92.0 hours")], t0).is_some());
        assert!(center.offer(&[warning("Low RUL", "91.5 hours")], t0).is_some());
    }

    #[test]
    fn test_critical_preferred_over_warning() {
        let mut center = ToastCenter::new(ToastPolicy::default());
        let alerts = vec![
            warning("Failure Risk", "Elevated failure risk: 0.45"),
            AlertNotice::new(Severity::Info, "Heartbeat", "ok"),
            critical("Overheating", "Core temperature critical: 85.0°C"),
            critical("High Vibration", "Vibration level critical: 3.40g"),
        ];

        let toast = center.offer(&alerts, Instant::now()).unwrap();
        assert_eq!(toast.severity, Severity::Critical);
        assert_eq!(toast.title, "Overheating");
        assert!(toast.requires_dismissal());
    }

    #[test]
    fn test_info_only_raises_nothing() {
        let mut center = ToastCenter::new(ToastPolicy::default());
        let alerts = vec![AlertNotice::new(Severity::Info, "Heartbeat", "ok")];
        assert!(center.offer(&alerts, Instant::now()).is_none());
        assert!(center.offer(&[], Instant::now()).is_none());
    }

    #[test]
    fn test_warnings_expire_and_criticals_wait_for_dismissal() {
        let mut center = ToastCenter::new(ToastPolicy::default());
        let t0 = Instant::now();

        center.offer(&[warning("Low RUL", "90 hours")], t0).unwrap();
        let pinned = center.offer(&[critical("Critical RUL", "40 hours")], t0).unwrap();
        assert_eq!(center.active(t0).len(), 2);

        let later = center.active(t0 + Duration::from_secs(6));
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].id, pinned.id);

        assert!(center.dismiss(pinned.id));
        assert!(!center.dismiss(pinned.id));
        assert!(center.active(t0 + Duration::from_secs(6)).is_empty());
    }

    #[test]
    fn test_history_limit_drops_oldest() {
        let policy = ToastPolicy {
            history_limit: 3,
            ..ToastPolicy::default()
        };
        let mut center = ToastCenter::new(policy);
        let t0 = Instant::now();

        for i in 0..5 {
            center
                .offer(&[critical("Overheating", &format!("reading {i}"))], t0)
                .unwrap();
        }

        let messages: Vec<String> = center.active(t0).into_iter().map(|t| t.message).collect();
        assert_eq!(messages, vec!["reading 2", "reading 3", "reading 4"]);
    }
}

//! Event rate limiting
//!
//! Deadline-based debounce and throttle. The owner feeds calls with
//! [`Throttle::call`] and polls due trailing edges with [`Throttle::poll`];
//! nothing here sleeps or spawns.

use std::time::{Duration, Instant};

use crate::ThrottleMethod;

#[derive(Debug, Clone)]
pub struct Throttle {
    method: ThrottleMethod,
    wait: Duration,
    last_fire: Option<Instant>,
    deadline: Option<Instant>,
}

impl Throttle {
    pub fn new(method: ThrottleMethod, wait: Duration) -> Self {
        Self {
            method,
            wait,
            last_fire: None,
            deadline: None,
        }
    }

    pub fn method(&self) -> ThrottleMethod {
        self.method
    }

    /// Record a call. Returns `true` when the call fires right away
    /// (leading edge of a throttle window).
    pub fn call(&mut self, now: Instant) -> bool {
        match self.method {
            ThrottleMethod::Debounce => {
                self.deadline = Some(now + self.wait);
                false
            }
            ThrottleMethod::Throttle => {
                let open = self.last_fire.is_none_or(|t| now >= t + self.wait);
                if open {
                    // An overdue trailing edge is folded into this fire
                    self.deadline = None;
                    self.last_fire = Some(now);
                    true
                } else {
                    if self.deadline.is_none() {
                        self.deadline = self.last_fire.map(|t| t + self.wait);
                    }
                    false
                }
            }
        }
    }

    /// Fire the trailing edge if it is due
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                self.last_fire = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Pending trailing edge, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(250);

    fn ms(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn test_debounce_trailing_only() {
        let t0 = Instant::now();
        let mut d = Throttle::new(ThrottleMethod::Debounce, WAIT);

        assert!(!d.call(t0));
        assert!(!d.call(ms(t0, 100)));
        // Deadline moved by the second call
        assert!(!d.poll(ms(t0, 250)));
        assert_eq!(d.deadline(), Some(ms(t0, 350)));
        assert!(d.poll(ms(t0, 350)));
        assert!(!d.poll(ms(t0, 400)));
    }

    #[test]
    fn test_throttle_leading_and_trailing() {
        let t0 = Instant::now();
        let mut t = Throttle::new(ThrottleMethod::Throttle, WAIT);

        assert!(t.call(t0));
        assert!(!t.call(ms(t0, 50)));
        assert!(!t.call(ms(t0, 100)));
        assert_eq!(t.deadline(), Some(ms(t0, 250)));

        assert!(t.poll(ms(t0, 250)));
        // The trailing fire opened a new window
        assert!(!t.call(ms(t0, 300)));
        assert_eq!(t.deadline(), Some(ms(t0, 500)));
    }

    #[test]
    fn test_throttle_open_window_fires() {
        let t0 = Instant::now();
        let mut t = Throttle::new(ThrottleMethod::Throttle, WAIT);

        assert!(t.call(t0));
        assert!(t.call(ms(t0, 600)));
        assert_eq!(t.deadline(), None);
    }
}

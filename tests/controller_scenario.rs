// tests/controller_scenario.rs
//
// End-to-end debounce scenarios against a recording transport.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use headline_relay::snapshot::pad_titles;
use headline_relay::{
    tick, Debounce, DeliveryError, DeliveryState, Headlines, Snapshot, TickDecision, Transport,
};

#[derive(Default)]
struct Recorder {
    delivered: Mutex<Vec<String>>,
    fail: Mutex<bool>,
}

impl Recorder {
    fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
    fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for Recorder {
    async fn deliver(&self, snapshot: &Snapshot) -> Result<(), DeliveryError> {
        if *self.fail.lock().unwrap() {
            return Err(DeliveryError::Protocol("write rejected".into()));
        }
        let first = snapshot
            .headlines
            .get("A")
            .and_then(|v| v.first().cloned())
            .unwrap_or_default();
        self.delivered.lock().unwrap().push(first);
        Ok(())
    }
    fn name(&self) -> &'static str {
        "recorder"
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 15, 8, 0, 0).unwrap() + ChronoDuration::seconds(secs)
}

fn content(title: &str, captured_at: DateTime<Utc>) -> Snapshot {
    let mut h = Headlines::new();
    h.insert("A", pad_titles(vec![title.to_string()], 10));
    h.insert("B", pad_titles(vec![], 10));
    Snapshot {
        captured_at,
        headlines: h,
    }
}

#[tokio::test]
async fn five_minute_window_scenario() {
    let tr = Recorder::default();
    let debounce = Debounce::new(Duration::from_secs(300));

    // t=0, X → delivered
    let out = tick(DeliveryState::default(), &content("X", at(0)), &tr, at(0), &debounce).await;
    assert!(matches!(out.decision, TickDecision::Delivered));
    assert_eq!(
        out.state,
        DeliveryState {
            last_fingerprint: Some(content("X", at(0)).fingerprint()),
            last_delivery_at: Some(at(0)),
        }
    );

    // t=100, Y → too early
    let out = tick(out.state, &content("Y", at(100)), &tr, at(100), &debounce).await;
    assert!(matches!(out.decision, TickDecision::Skipped(_)));

    // t=310, Y → delivered
    let out = tick(out.state, &content("Y", at(310)), &tr, at(310), &debounce).await;
    assert!(matches!(out.decision, TickDecision::Delivered));
    assert_eq!(out.state.last_delivery_at, Some(at(310)));

    assert_eq!(tr.delivered(), vec!["X".to_string(), "Y".to_string()]);
}

#[tokio::test]
async fn new_capture_time_alone_never_triggers_a_push() {
    let tr = Recorder::default();
    let debounce = Debounce::new(Duration::from_secs(60));

    let mut state = DeliveryState::default();
    for minute in 0..30 {
        let now = at(minute * 60);
        state = tick(state, &content("same", now), &tr, now, &debounce).await.state;
    }
    assert_eq!(tr.delivered().len(), 1);
}

#[tokio::test]
async fn unreachable_device_is_retried_at_debounce_cadence() {
    let tr = Recorder::default();
    let debounce = Debounce::new(Duration::from_secs(300));

    let mut state = tick(DeliveryState::default(), &content("X", at(0)), &tr, at(0), &debounce)
        .await
        .state;

    tr.set_failing(true);
    // Poll every minute for 20 minutes with new content Y and a dead device.
    let mut attempts = 0;
    for minute in 1..=20 {
        let now = at(minute * 60);
        let out = tick(state, &content("Y", now), &tr, now, &debounce).await;
        if matches!(out.decision, TickDecision::Failed(_)) {
            attempts += 1;
        }
        state = out.state;
    }
    // First attempt at 360s, then each > 300s later: 720s, 1080s.
    assert_eq!(attempts, 3);
    assert_eq!(state.last_fingerprint, Some(content("X", at(0)).fingerprint()));

    tr.set_failing(false);
    let now = at(1080 + 360);
    let out = tick(state, &content("Y", now), &tr, now, &debounce).await;
    assert!(matches!(out.decision, TickDecision::Delivered));
    assert_eq!(tr.delivered(), vec!["X".to_string(), "Y".to_string()]);
}

//! Selection capture state.
//!
//! Pure data and state transitions only: timestamps are supplied by the
//! caller so every transition is reproducible in tests.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::anchor::AnchorRequest;

/// A rectangle in page-relative coordinates, origin top-left, 0..1 on both
/// axes while it stays on the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl NormalizedRect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Whether the rectangle extends past the top or bottom edge, which is
    /// how a drag across two pages shows up.
    pub fn leaves_page(&self) -> bool {
        self.top < 0.0 || self.bottom > 1.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSnapshot {
    pub text: String,
    pub raw_text: String,
    pub file_path: PathBuf,
    /// 1-based.
    pub page: usize,
    pub rect: NormalizedRect,
    pub captured_at: DateTime<Utc>,
}

impl SelectionSnapshot {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.captured_at
    }

    pub fn crosses_page(&self) -> bool {
        self.rect.leaves_page()
    }

    /// Vertical position used as the geometric position hint.
    pub fn y_fraction(&self) -> f32 {
        self.rect.top.clamp(0.0, 1.0)
    }
}

impl From<&SelectionSnapshot> for AnchorRequest {
    fn from(snapshot: &SelectionSnapshot) -> Self {
        let mut request = AnchorRequest::new(snapshot.text.clone())
            .with_page(snapshot.page)
            .with_y_fraction(snapshot.y_fraction());
        if !snapshot.raw_text.trim().is_empty() {
            request = request.with_raw_text(snapshot.raw_text.clone());
        }
        request.crosses_page = snapshot.crosses_page();
        request
    }
}

// ---------------------------------------------------------------------------
// SelectionSlot
// ---------------------------------------------------------------------------

/// Holds the most recent capture. A new capture always replaces the old
/// one. The live read succeeds once per capture; the cached read succeeds
/// any number of times while the capture is younger than `max_age`.
#[derive(Debug, Default)]
pub struct SelectionSlot {
    current: Option<SelectionSnapshot>,
    consumed: bool,
}

impl SelectionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&mut self, snapshot: SelectionSnapshot) {
        self.current = Some(snapshot);
        self.consumed = false;
    }

    /// Take the live capture. Returns `None` once it has been consumed.
    pub fn take_live(&mut self) -> Option<SelectionSnapshot> {
        if self.consumed {
            return None;
        }
        let snapshot = self.current.clone()?;
        self.consumed = true;
        Some(snapshot)
    }

    /// The latest capture if it is still fresh, consumed or not.
    pub fn cached(&self, now: DateTime<Utc>, max_age: Duration) -> Option<&SelectionSnapshot> {
        self.current
            .as_ref()
            .filter(|s| s.age(now) >= Duration::zero() && s.age(now) <= max_age)
    }

    /// Live capture first, then a fresh cached one.
    pub fn for_anchoring(&mut self, now: DateTime<Utc>, max_age: Duration) -> Option<SelectionSnapshot> {
        if let Some(live) = self.take_live() {
            return Some(live);
        }
        self.cached(now, max_age).cloned()
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.consumed = false;
    }
}

// ---------------------------------------------------------------------------
// TargetMemory
// ---------------------------------------------------------------------------

/// The last document a user interacted with, remembered for a short window
/// so requests without an explicit path still land on the right document.
#[derive(Debug, Clone)]
pub struct TargetMemory {
    last: Option<(PathBuf, DateTime<Utc>)>,
    ttl: Duration,
}

impl TargetMemory {
    pub fn new(ttl: Duration) -> Self {
        Self { last: None, ttl }
    }

    pub fn touch(&mut self, path: impl Into<PathBuf>, now: DateTime<Utc>) {
        self.last = Some((path.into(), now));
    }

    pub fn current(&self, now: DateTime<Utc>) -> Option<&Path> {
        self.last
            .as_ref()
            .filter(|(_, at)| now - *at <= self.ttl)
            .map(|(path, _)| path.as_path())
    }

    /// An explicit path wins and refreshes the memory; otherwise the
    /// remembered target is used if it has not expired.
    pub fn resolve(&mut self, explicit: Option<&Path>, now: DateTime<Utc>) -> Option<PathBuf> {
        match explicit {
            Some(path) => {
                self.touch(path, now);
                Some(path.to_path_buf())
            }
            None => self.current(now).map(Path::to_path_buf),
        }
    }

    pub fn forget(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_time(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn make_snapshot(text: &str, at: i64) -> SelectionSnapshot {
        SelectionSnapshot {
            text: text.to_string(),
            raw_text: format!("before {text} after"),
            file_path: PathBuf::from("/tmp/paper.pdf"),
            page: 2,
            rect: NormalizedRect::new(0.1, 0.4, 0.3, 0.42),
            captured_at: make_time(at),
        }
    }

    // =====================================================================
    // SelectionSlot
    // =====================================================================

    #[test]
    fn test_live_capture_is_consumed_once() {
        let mut slot = SelectionSlot::new();
        slot.capture(make_snapshot("alpha", 0));
        assert_eq!(slot.take_live().map(|s| s.text), Some("alpha".to_string()));
        assert!(slot.take_live().is_none());
    }

    #[test]
    fn test_new_capture_supersedes_previous() {
        let mut slot = SelectionSlot::new();
        slot.capture(make_snapshot("alpha", 0));
        slot.take_live();
        slot.capture(make_snapshot("beta", 1));
        assert_eq!(slot.take_live().map(|s| s.text), Some("beta".to_string()));
    }

    #[test]
    fn test_cached_read_respects_age_window() {
        let mut slot = SelectionSlot::new();
        slot.capture(make_snapshot("alpha", 0));
        slot.take_live();
        let window = Duration::seconds(5);
        assert!(slot.cached(make_time(3), window).is_some());
        assert!(slot.cached(make_time(6), window).is_none());
        assert_eq!(
            slot.for_anchoring(make_time(4), window).map(|s| s.text),
            Some("alpha".to_string())
        );
    }

    #[test]
    fn test_clear_empties_slot() {
        let mut slot = SelectionSlot::new();
        slot.capture(make_snapshot("alpha", 0));
        slot.clear();
        assert!(slot.take_live().is_none());
        assert!(slot.cached(make_time(0), Duration::seconds(5)).is_none());
    }

    // =====================================================================
    // Snapshot -> request
    // =====================================================================

    #[test]
    fn test_request_from_snapshot() {
        let snapshot = make_snapshot("apple", 0);
        let request = AnchorRequest::from(&snapshot);
        assert_eq!(request.selection, "apple");
        assert_eq!(request.page, Some(2));
        assert_eq!(request.y_fraction, Some(0.4));
        assert_eq!(request.raw_text.as_deref(), Some("before apple after"));
        assert!(!request.crosses_page);
    }

    #[test]
    fn test_rect_leaving_page_marks_cross_page() {
        let mut snapshot = make_snapshot("apple", 0);
        snapshot.rect = NormalizedRect::new(0.1, 0.95, 0.4, 1.08);
        assert!(AnchorRequest::from(&snapshot).crosses_page);
    }

    // =====================================================================
    // TargetMemory
    // =====================================================================

    #[test]
    fn test_target_memory_expires() {
        let mut memory = TargetMemory::new(Duration::seconds(30));
        memory.touch("/docs/a.pdf", make_time(0));
        assert_eq!(memory.current(make_time(10)), Some(Path::new("/docs/a.pdf")));
        assert_eq!(memory.current(make_time(31)), None);
    }

    #[test]
    fn test_explicit_target_wins_and_refreshes() {
        let mut memory = TargetMemory::new(Duration::seconds(30));
        memory.touch("/docs/a.pdf", make_time(0));
        let chosen = memory.resolve(Some(Path::new("/docs/b.pdf")), make_time(20));
        assert_eq!(chosen, Some(PathBuf::from("/docs/b.pdf")));
        assert_eq!(
            memory.resolve(None, make_time(45)),
            Some(PathBuf::from("/docs/b.pdf"))
        );
        memory.forget();
        assert_eq!(memory.resolve(None, make_time(46)), None);
    }
}

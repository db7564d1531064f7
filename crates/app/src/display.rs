use parking_lot::RwLock;
use std::time::Instant;

/// Caption state shared between the recognition loop and the renderer.
///
/// The recognition loop is the only writer; renderers read point-in-time
/// snapshots, so a caption can never tear mid-update. The translated text
/// carries a hold deadline: renderers suppress it once the deadline has
/// passed, and the loop clears stale text for real on the next quiet
/// recognition cycle.
#[derive(Default)]
pub struct DisplayState {
    inner: RwLock<Captions>,
}

#[derive(Default)]
struct Captions {
    source: String,
    translated: String,
    hold_until: Option<Instant>,
}

/// Point-in-time copy of the caption fields.
#[derive(Debug, Clone, Default)]
pub struct CaptionSnapshot {
    pub source: String,
    pub translated: String,
    pub hold_until: Option<Instant>,
}

impl CaptionSnapshot {
    /// Translated text if its hold deadline has not yet passed.
    pub fn visible_translation(&self, now: Instant) -> &str {
        match self.hold_until {
            Some(deadline) if now <= deadline => &self.translated,
            _ => "",
        }
    }
}

impl DisplayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CaptionSnapshot {
        let inner = self.inner.read();
        CaptionSnapshot {
            source: inner.source.clone(),
            translated: inner.translated.clone(),
            hold_until: inner.hold_until,
        }
    }

    pub fn set_source(&self, text: String) {
        self.inner.write().source = text;
    }

    pub fn set_translation(&self, text: String, hold_until: Instant) {
        let mut inner = self.inner.write();
        inner.translated = text;
        inner.hold_until = Some(hold_until);
    }

    pub fn clear_translation(&self) {
        let mut inner = self.inner.write();
        inner.translated.clear();
        inner.hold_until = None;
    }

    /// Blanks both caption fields. Used when a quiet recognition cycle
    /// arrives after the hold deadline.
    pub fn clear_captions(&self) {
        let mut inner = self.inner.write();
        inner.source.clear();
        inner.translated.clear();
        inner.hold_until = None;
    }

    /// True when no hold deadline is set or the deadline has passed.
    pub fn hold_expired(&self, now: Instant) -> bool {
        self.inner.read().hold_until.map_or(true, |deadline| now > deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn snapshot_reflects_latest_writes() {
        let display = DisplayState::new();
        display.set_source("kumusta".to_string());
        display.set_source("kumusta ka".to_string());
        let snap = display.snapshot();
        assert_eq!(snap.source, "kumusta ka");
        assert_eq!(snap.translated, "");
    }

    #[test]
    fn hold_deadline_gates_visible_translation() {
        let display = DisplayState::new();
        let now = Instant::now();
        display.set_translation("maayong buntag".to_string(), now + Duration::from_millis(2500));

        let snap = display.snapshot();
        assert_eq!(snap.visible_translation(now), "maayong buntag");
        assert_eq!(
            snap.visible_translation(now + Duration::from_millis(2500)),
            "maayong buntag"
        );
        assert_eq!(snap.visible_translation(now + Duration::from_millis(2501)), "");
    }

    #[test]
    fn hold_is_expired_without_a_deadline() {
        let display = DisplayState::new();
        assert!(display.hold_expired(Instant::now()));
    }

    #[test]
    fn hold_expiry_tracks_the_deadline() {
        let display = DisplayState::new();
        let now = Instant::now();
        display.set_translation("salamat".to_string(), now + Duration::from_secs(1));
        assert!(!display.hold_expired(now));
        assert!(display.hold_expired(now + Duration::from_secs(2)));
    }

    #[test]
    fn clear_captions_blanks_everything() {
        let display = DisplayState::new();
        display.set_source("unsa na".to_string());
        display.set_translation("ano na".to_string(), Instant::now() + Duration::from_secs(1));
        display.clear_captions();

        let snap = display.snapshot();
        assert_eq!(snap.source, "");
        assert_eq!(snap.translated, "");
        assert!(snap.hold_until.is_none());
    }
}

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::host::DiffHost;

/// Rows occupied by one overlay zone.
pub const ZONE_HEIGHT: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HunkActionKind {
    Stage,
    Unstage,
    Discard,
}

impl HunkActionKind {
    /// Button order inside a zone.
    pub const ALL: [HunkActionKind; 3] = [
        HunkActionKind::Stage,
        HunkActionKind::Unstage,
        HunkActionKind::Discard,
    ];

    pub fn label(self) -> &'static str {
        match self {
            HunkActionKind::Stage => "Stage",
            HunkActionKind::Unstage => "Unstage",
            HunkActionKind::Discard => "Discard",
        }
    }

    /// Key that clicks this button on the focused zone.
    pub fn key(self) -> char {
        match self {
            HunkActionKind::Stage => 's',
            HunkActionKind::Unstage => 'u',
            HunkActionKind::Discard => 'd',
        }
    }
}

/// One contiguous edit region and the operations currently offered on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HunkAction {
    pub id: String,
    /// Preferred anchor; ignored unless positive.
    pub anchor_line: Option<i64>,
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub additions: usize,
    pub deletions: usize,
    pub stage_enabled: bool,
    pub unstage_enabled: bool,
    pub discard_enabled: bool,
    pub disabled: bool,
}

impl HunkAction {
    pub fn offers(&self, kind: HunkActionKind) -> bool {
        match kind {
            HunkActionKind::Stage => self.stage_enabled,
            HunkActionKind::Unstage => self.unstage_enabled,
            HunkActionKind::Discard => self.discard_enabled,
        }
    }

    pub fn range_label(&self) -> String {
        format!(
            "-{},{} +{},{}",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

/// Externally driven highlight/busy state for the action buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HunkActionState {
    pub active_id: Option<String>,
    pub active_kind: Option<HunkActionKind>,
    pub busy: bool,
}

impl HunkActionState {
    pub fn running(id: &str, kind: HunkActionKind) -> Self {
        HunkActionState {
            active_id: Some(id.to_string()),
            active_kind: Some(kind),
            busy: true,
        }
    }

    fn is_active(&self, id: &str, kind: HunkActionKind) -> bool {
        self.active_id.as_deref() == Some(id) && self.active_kind == Some(kind)
    }
}

/// Emitted when an enabled button is clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkActionRequest {
    pub id: String,
    pub kind: HunkActionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneButton {
    pub kind: HunkActionKind,
    pub active: bool,
    pub disabled: bool,
}

/// A visual row placed into the modified buffer's layout, owning one hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayZone {
    pub hunk_id: String,
    /// 1-based line the zone sits in front of.
    pub anchor_line: usize,
    /// The zone is inserted after this line (0 = top of the buffer).
    pub after_line: usize,
    pub height: u16,
    pub range_label: String,
    pub additions: usize,
    pub deletions: usize,
    pub unavailable: bool,
    pub buttons: Vec<ZoneButton>,
}

impl OverlayZone {
    /// Whether the `+a -d` badge is shown at all.
    pub fn has_counts(&self) -> bool {
        self.additions > 0 || self.deletions > 0
    }

    pub fn button(&self, kind: HunkActionKind) -> Option<&ZoneButton> {
        self.buttons.iter().find(|b| b.kind == kind)
    }
}

/// Anchor line of a hunk, always within `[1, line_count + 1]`.
///
/// A positive explicit anchor wins. Otherwise `new_start` is used when the hunk
/// adds lines; pure deletions fall back to `new_start`, then `old_start`,
/// then line 1.
pub fn anchor_line(hunk: &HunkAction, line_count: usize) -> usize {
    let max = line_count.saturating_add(1).max(1);
    let clamp = |line: usize| line.clamp(1, max);

    if let Some(anchor) = hunk.anchor_line.filter(|a| *a > 0) {
        return clamp(usize::try_from(anchor).unwrap_or(usize::MAX));
    }
    if hunk.new_count > 0 {
        return clamp(hunk.new_start);
    }
    if hunk.new_start > 0 {
        return clamp(hunk.new_start);
    }
    if hunk.old_start > 0 {
        return clamp(hunk.old_start);
    }
    1
}

/// Build the zones for a hunk list, top to bottom.
///
/// Hunks without an id are dropped. Ties on the anchor line keep input order.
pub fn build_zones(
    hunks: &[HunkAction],
    state: &HunkActionState,
    line_count: usize,
) -> Vec<OverlayZone> {
    let mut anchored: Vec<(usize, &HunkAction)> = hunks
        .iter()
        .filter(|h| !h.id.trim().is_empty())
        .map(|h| (anchor_line(h, line_count), h))
        .collect();
    anchored.sort_by_key(|(anchor, _)| *anchor);

    anchored
        .into_iter()
        .map(|(anchor, hunk)| {
            let buttons = HunkActionKind::ALL
                .into_iter()
                .filter(|kind| hunk.offers(*kind))
                .map(|kind| ZoneButton {
                    kind,
                    active: state.is_active(&hunk.id, kind),
                    disabled: state.busy || hunk.disabled,
                })
                .collect();

            OverlayZone {
                hunk_id: hunk.id.clone(),
                anchor_line: anchor,
                after_line: anchor - 1,
                height: ZONE_HEIGHT,
                range_label: hunk.range_label(),
                additions: hunk.additions,
                deletions: hunk.deletions,
                unavailable: hunk.disabled,
                buttons,
            }
        })
        .collect()
}

/// Owns the overlay rows of one diff view. Every recompute clears all zones
/// and adds the new set; zones are never patched in place.
#[derive(Debug, Default)]
pub struct OverlayManager {
    hunks: Vec<HunkAction>,
    enabled: bool,
    state: HunkActionState,
    zones: Vec<OverlayZone>,
    recomputes: u64,
}

impl OverlayManager {
    pub fn new(enabled: bool) -> Self {
        OverlayManager {
            enabled,
            ..Default::default()
        }
    }

    pub fn zones(&self) -> &[OverlayZone] {
        &self.zones
    }

    pub fn hunks(&self) -> &[HunkAction] {
        &self.hunks
    }

    pub fn state(&self) -> &HunkActionState {
        &self.state
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn recompute_count(&self) -> u64 {
        self.recomputes
    }

    /// Returns true when the input differs from what was set before.
    pub fn set_hunks(&mut self, hunks: Vec<HunkAction>) -> bool {
        if self.hunks == hunks {
            return false;
        }
        self.hunks = hunks;
        true
    }

    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        let changed = self.enabled != enabled;
        self.enabled = enabled;
        changed
    }

    pub fn set_state(&mut self, state: HunkActionState) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state;
        true
    }

    /// Rebuild every zone against a buffer of `line_count` lines, or against
    /// no buffer at all.
    pub fn recompute(&mut self, line_count: Option<usize>, host: &mut dyn DiffHost) {
        self.recomputes += 1;
        self.clear(host);

        let Some(line_count) = line_count else {
            return;
        };
        if !self.enabled || self.hunks.is_empty() {
            return;
        }

        self.zones = build_zones(&self.hunks, &self.state, line_count);
        for zone in &self.zones {
            host.add_zone(zone);
        }
        trace!(zones = self.zones.len(), line_count, "overlay recompute");
    }

    pub fn clear(&mut self, host: &mut dyn DiffHost) {
        host.clear_zones();
        self.zones.clear();
    }

    /// A click on a zone button. Only present, enabled buttons emit a request;
    /// no local state changes either way.
    pub fn click(&self, hunk_id: &str, kind: HunkActionKind) -> Option<HunkActionRequest> {
        let zone = self.zones.iter().find(|z| z.hunk_id == hunk_id)?;
        let button = zone.button(kind)?;
        if button.disabled {
            return None;
        }
        Some(HunkActionRequest {
            id: hunk_id.to_string(),
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::host::recording::{HostCall, RecordingHost};

    fn make_hunk(id: &str, old: (usize, usize), new: (usize, usize)) -> HunkAction {
        HunkAction {
            id: id.to_string(),
            anchor_line: None,
            old_start: old.0,
            old_count: old.1,
            new_start: new.0,
            new_count: new.1,
            additions: new.1,
            deletions: old.1,
            stage_enabled: true,
            unstage_enabled: false,
            discard_enabled: true,
            disabled: false,
        }
    }

    // ── anchor_line ──

    #[test]
    fn explicit_anchor_wins_when_positive() {
        let mut hunk = make_hunk("h", (9, 1), (10, 3));
        hunk.anchor_line = Some(12);
        assert_eq!(anchor_line(&hunk, 40), 12);
        hunk.anchor_line = Some(0);
        assert_eq!(anchor_line(&hunk, 40), 10);
        hunk.anchor_line = Some(-4);
        assert_eq!(anchor_line(&hunk, 40), 10);
    }

    #[test]
    fn pure_deletion_anchors_at_new_start_then_old_start() {
        assert_eq!(anchor_line(&make_hunk("h", (5, 2), (4, 0)), 40), 4);
        assert_eq!(anchor_line(&make_hunk("h", (5, 2), (0, 0)), 40), 5);
        assert_eq!(anchor_line(&make_hunk("h", (0, 0), (0, 0)), 40), 1);
    }

    #[test]
    fn anchor_is_clamped_into_buffer() {
        let mut hunk = make_hunk("h", (1, 1), (90, 2));
        assert_eq!(anchor_line(&hunk, 40), 41);
        hunk.anchor_line = Some(i64::MAX);
        assert_eq!(anchor_line(&hunk, 40), 41);
        assert_eq!(anchor_line(&make_hunk("h", (1, 1), (0, 2)), 40), 1);
        assert_eq!(anchor_line(&make_hunk("h", (1, 1), (3, 2)), 0), 1);
    }

    // ── build_zones ──

    #[test]
    fn zones_are_sorted_by_anchor_and_stable_on_ties() {
        let hunks = vec![
            make_hunk("late", (30, 1), (31, 1)),
            make_hunk("first-tie", (5, 1), (6, 1)),
            make_hunk("second-tie", (5, 0), (6, 2)),
            make_hunk("early", (1, 1), (1, 1)),
        ];
        let zones = build_zones(&hunks, &HunkActionState::default(), 40);
        let ids: Vec<&str> = zones.iter().map(|z| z.hunk_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "first-tie", "second-tie", "late"]);
        assert!(zones.windows(2).all(|w| w[0].anchor_line <= w[1].anchor_line));
    }

    #[test]
    fn hunks_without_id_are_dropped() {
        let hunks = vec![
            make_hunk("", (1, 1), (1, 1)),
            make_hunk("  ", (2, 1), (2, 1)),
            make_hunk("ok", (3, 1), (3, 1)),
        ];
        let zones = build_zones(&hunks, &HunkActionState::default(), 10);
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].hunk_id, "ok");
    }

    #[test]
    fn zone_sits_after_the_line_before_its_anchor() {
        let zones = build_zones(
            &[make_hunk("h1", (9, 1), (10, 3))],
            &HunkActionState::default(),
            40,
        );
        assert_eq!(zones[0].anchor_line, 10);
        assert_eq!(zones[0].after_line, 9);
        assert_eq!(zones[0].range_label, "-9,1 +10,3");
        assert_eq!(zones[0].height, ZONE_HEIGHT);
    }

    #[test]
    fn zero_counts_render_without_badge() {
        let mut hunk = make_hunk("h", (3, 0), (3, 0));
        hunk.additions = 0;
        hunk.deletions = 0;
        let zones = build_zones(&[hunk], &HunkActionState::default(), 10);
        assert!(!zones[0].has_counts());
        assert_eq!(zones[0].range_label, "-3,0 +3,0");
    }

    #[test]
    fn buttons_follow_enabled_flags() {
        let mut hunk = make_hunk("h", (1, 1), (1, 1));
        hunk.stage_enabled = false;
        hunk.unstage_enabled = true;
        hunk.discard_enabled = false;
        let zones = build_zones(&[hunk], &HunkActionState::default(), 10);
        let kinds: Vec<HunkActionKind> = zones[0].buttons.iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![HunkActionKind::Unstage]);
    }

    #[test]
    fn disabled_hunk_is_unavailable_with_all_buttons_disabled() {
        let mut hunk = make_hunk("h", (1, 1), (1, 1));
        hunk.disabled = true;
        hunk.unstage_enabled = true;
        let zones = build_zones(&[hunk], &HunkActionState::default(), 10);
        assert!(zones[0].unavailable);
        assert_eq!(zones[0].buttons.len(), 3);
        assert!(zones[0].buttons.iter().all(|b| b.disabled));
    }

    #[test]
    fn active_button_matches_id_and_kind() {
        let hunks = vec![make_hunk("a", (1, 1), (1, 1)), make_hunk("b", (5, 1), (5, 1))];
        let state = HunkActionState::running("b", HunkActionKind::Discard);
        let zones = build_zones(&hunks, &state, 10);

        assert!(zones[0].buttons.iter().all(|b| !b.active));
        let discard = zones[1].button(HunkActionKind::Discard).unwrap();
        let stage = zones[1].button(HunkActionKind::Stage).unwrap();
        assert!(discard.active);
        assert!(!stage.active);
        assert!(zones.iter().flat_map(|z| &z.buttons).all(|b| b.disabled));
    }

    // ── OverlayManager ──

    #[test]
    fn recompute_clears_before_adding() {
        let mut manager = OverlayManager::new(true);
        let mut host = RecordingHost::default();
        manager.set_hunks(vec![make_hunk("h1", (9, 1), (10, 3))]);

        manager.recompute(Some(40), &mut host);
        manager.recompute(Some(40), &mut host);

        assert_eq!(
            host.calls,
            vec![
                HostCall::ClearZones,
                HostCall::AddZone { hunk_id: "h1".into(), after_line: 9 },
                HostCall::ClearZones,
                HostCall::AddZone { hunk_id: "h1".into(), after_line: 9 },
            ]
        );
        assert_eq!(host.zones.len(), 1);
        assert_eq!(manager.recompute_count(), 2);
    }

    #[test]
    fn recompute_only_clears_when_disabled_or_bufferless() {
        let mut manager = OverlayManager::new(false);
        let mut host = RecordingHost::default();
        manager.set_hunks(vec![make_hunk("h1", (1, 1), (1, 1))]);

        manager.recompute(Some(10), &mut host);
        manager.set_enabled(true);
        manager.recompute(None, &mut host);
        manager.set_hunks(Vec::new());
        manager.recompute(Some(10), &mut host);

        assert!(host.calls.iter().all(|c| *c == HostCall::ClearZones));
        assert!(manager.zones().is_empty());
    }

    #[test]
    fn click_emits_only_for_enabled_buttons() {
        let mut manager = OverlayManager::new(true);
        let mut host = RecordingHost::default();
        let mut blocked = make_hunk("blocked", (8, 1), (8, 1));
        blocked.disabled = true;
        manager.set_hunks(vec![make_hunk("h1", (1, 1), (1, 1)), blocked]);
        manager.recompute(Some(10), &mut host);

        assert_eq!(
            manager.click("h1", HunkActionKind::Stage),
            Some(HunkActionRequest { id: "h1".into(), kind: HunkActionKind::Stage })
        );
        assert_eq!(manager.click("h1", HunkActionKind::Unstage), None);
        assert_eq!(manager.click("blocked", HunkActionKind::Stage), None);
        assert_eq!(manager.click("missing", HunkActionKind::Stage), None);
        // Clicking never mutates zones.
        assert_eq!(manager.zones().len(), 2);
    }

    #[test]
    fn click_is_refused_while_busy() {
        let mut manager = OverlayManager::new(true);
        let mut host = RecordingHost::default();
        manager.set_hunks(vec![make_hunk("h1", (1, 1), (1, 1))]);
        manager.set_state(HunkActionState::running("other", HunkActionKind::Stage));
        manager.recompute(Some(10), &mut host);

        assert_eq!(manager.click("h1", HunkActionKind::Stage), None);
    }

    #[test]
    fn setters_report_changes() {
        let mut manager = OverlayManager::new(true);
        assert!(!manager.set_enabled(true));
        assert!(manager.set_hunks(vec![make_hunk("h", (1, 1), (1, 1))]));
        assert!(!manager.set_hunks(vec![make_hunk("h", (1, 1), (1, 1))]));
        assert!(!manager.set_state(HunkActionState::default()));
        assert!(manager.set_state(HunkActionState::running("h", HunkActionKind::Stage)));
    }
}

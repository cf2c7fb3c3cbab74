use tracing::trace;

use crate::engine::{BufferId, DiffHost, ModelPair, OverlayZone};

/// What the detail pane draws: the bound buffer pair, its flags and the
/// overlay rows placed into it.
#[derive(Debug, Default)]
pub struct EditorSurface {
    bound: Option<ModelPair>,
    read_only: bool,
    wrap: bool,
    zones: Vec<OverlayZone>,
    released: usize,
}

impl EditorSurface {
    pub fn bound(&self) -> Option<&ModelPair> {
        self.bound.as_ref()
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn wrap(&self) -> bool {
        self.wrap
    }

    /// Placed zones, top to bottom.
    pub fn zones(&self) -> &[OverlayZone] {
        &self.zones
    }

    /// Zones placed right after `line` (0 = before the first line).
    pub fn zones_after(&self, line: usize) -> impl Iterator<Item = &OverlayZone> {
        self.zones.iter().filter(move |z| z.after_line == line)
    }

    pub fn released_count(&self) -> usize {
        self.released
    }
}

impl DiffHost for EditorSurface {
    fn bind(&mut self, pair: &ModelPair) {
        self.bound = Some(pair.clone());
    }

    fn detach(&mut self) {
        self.bound = None;
    }

    fn release(&mut self, id: &BufferId) {
        trace!(buffer = %id, "surface released buffer");
        self.released += 1;
    }

    fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    fn set_wrap(&mut self, wrap: bool) {
        self.wrap = wrap;
    }

    fn clear_zones(&mut self) {
        self.zones.clear();
    }

    fn add_zone(&mut self, zone: &OverlayZone) {
        self.zones.push(zone.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DiffEditor, DiffRequest, HunkAction};

    #[test]
    fn surface_tracks_editor_output() {
        let mut editor = DiffEditor::new(EditorSurface::default(), true);
        editor.set_read_only(true);
        editor.mark_ready();
        editor.sync(&DiffRequest {
            path: "a.rs".into(),
            original_text: "a\n".into(),
            modified_text: "a\nb\nc\n".into(),
            original_path: None,
        });
        editor.set_hunk_actions(vec![
            HunkAction {
                id: "1".into(),
                new_start: 2,
                new_count: 2,
                stage_enabled: true,
                ..Default::default()
            },
            HunkAction {
                id: "2".into(),
                new_start: 2,
                new_count: 1,
                ..Default::default()
            },
        ]);
        editor.flush();

        let surface = editor.host();
        assert!(surface.read_only());
        assert_eq!(surface.bound().unwrap().modified.as_str(), "a.rs");
        assert_eq!(surface.zones_after(1).count(), 2);
        assert_eq!(surface.zones_after(0).count(), 0);

        editor.teardown();
        assert!(editor.host().bound().is_none());
        assert!(editor.host().zones().is_empty());
        assert_eq!(editor.host().released_count(), 2);
    }
}

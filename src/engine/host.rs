use super::buffer::BufferId;
use super::overlay::OverlayZone;

/// The (original, modified) pairing currently presented to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPair {
    pub original: BufferId,
    pub modified: BufferId,
}

/// The rendering side of a diff view.
///
/// The engine owns the buffers; a host only ever sees their identities and the
/// overlay rows to place. Calls arrive in a fixed order for a replaced pair:
/// `bind(new)` first, `release(old)` later.
pub trait DiffHost {
    /// Present a new buffer pairing.
    fn bind(&mut self, pair: &ModelPair);

    /// Stop presenting any buffers.
    fn detach(&mut self);

    /// A buffer has been disposed and its identity will not be bound again
    /// unless recreated.
    fn release(&mut self, id: &BufferId);

    fn set_read_only(&mut self, read_only: bool);

    fn set_wrap(&mut self, wrap: bool);

    fn clear_zones(&mut self);

    fn add_zone(&mut self, zone: &OverlayZone);
}

impl<H: DiffHost + ?Sized> DiffHost for &mut H {
    fn bind(&mut self, pair: &ModelPair) {
        (**self).bind(pair)
    }

    fn detach(&mut self) {
        (**self).detach()
    }

    fn release(&mut self, id: &BufferId) {
        (**self).release(id)
    }

    fn set_read_only(&mut self, read_only: bool) {
        (**self).set_read_only(read_only)
    }

    fn set_wrap(&mut self, wrap: bool) {
        (**self).set_wrap(wrap)
    }

    fn clear_zones(&mut self) {
        (**self).clear_zones()
    }

    fn add_zone(&mut self, zone: &OverlayZone) {
        (**self).add_zone(zone)
    }
}

//! The outbound seam: where room snapshots go after a change.

use std::sync::Arc;

use buzzer_protocol::{RoomCode, RoomSnapshot};

/// Delivers a room's snapshot to everyone subscribed to that room.
///
/// Called from inside a room actor after each applied transition, so an
/// implementation must hand the snapshot off and return without waiting
/// for delivery. The room layer never learns whether anyone received it.
pub trait Broadcaster: Send + Sync + 'static {
    fn publish(&self, code: &RoomCode, snapshot: &RoomSnapshot);
}

impl<B: Broadcaster + ?Sized> Broadcaster for Arc<B> {
    fn publish(&self, code: &RoomCode, snapshot: &RoomSnapshot) {
        (**self).publish(code, snapshot);
    }
}

/// Discards every snapshot. Useful when nothing is listening.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
    fn publish(&self, code: &RoomCode, _snapshot: &RoomSnapshot) {
        tracing::trace!(room = %code, "snapshot dropped (no broadcaster)");
    }
}

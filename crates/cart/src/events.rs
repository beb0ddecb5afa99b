//! Cart change notifications.
//!
//! Presentation code subscribes to [`CartEvent`]s to refresh badges and
//! surface non-fatal failures. Events are best effort: with no subscribers
//! they are dropped, and slow subscribers may observe `Lagged`.

use basket_core::{CartMode, LineId};

use crate::error::Mutation;

/// Capacity of the event channel.
pub const EVENT_CAPACITY: usize = 64;

/// Something observable happened to the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEvent {
    /// The active collection changed.
    Changed {
        /// Mode whose collection changed.
        mode: CartMode,
    },
    /// The authenticated mirror was replaced from the backend.
    Synced {
        /// Lines now in the mirror.
        lines: usize,
    },
    /// A mutation failed at the backend and was rolled back.
    MutationFailed {
        /// Which mutation failed.
        operation: Mutation,
        /// Line the mutation targeted, if any.
        line_id: Option<LineId>,
        /// Error message.
        reason: String,
    },
    /// The backend could not be reached; the previous mirror was kept.
    SyncUnavailable {
        /// Error message.
        reason: String,
    },
    /// Merge-on-login finished with some lines not merged.
    PartialMergeFailure {
        /// Lines merged successfully.
        merged: usize,
        /// Lines that failed and were dropped.
        failed: usize,
    },
    /// The session ended and the authenticated mirror was discarded.
    RemoteDiscarded,
}

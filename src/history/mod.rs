//! Fixed-capacity circular store of previously entered lines.
//!
//! The ring keeps the last [`HISTORY_DEPTH`] lines. Inserting when full
//! overwrites the oldest slot. A navigation offset of 0 means "no
//! history selected, editing the live buffer"; negative offsets walk
//! back through the stored lines, clamped to what is actually stored.

use heapless::String;

use crate::session::MAX_LINE_LENGTH;

/// Number of history slots.
pub const HISTORY_DEPTH: usize = 5;

/// The history ring.
pub struct History {
    items: [String<MAX_LINE_LENGTH>; HISTORY_DEPTH],
    number: usize,
    record: usize,
    offset: i16,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// An empty ring.
    pub fn new() -> Self {
        History {
            items: core::array::from_fn(|_| String::new()),
            number: 0,
            record: 0,
            offset: 0,
        }
    }

    /// Record a completed line.
    ///
    /// Empty lines and a line identical to the most recent entry are
    /// skipped. Recording resets the navigation offset.
    pub fn push(&mut self, line: &str) {
        self.offset = 0;
        if line.is_empty() {
            return;
        }
        if self.number > 0 && self.latest() == line {
            return;
        }
        let slot = &mut self.items[self.record];
        slot.clear();
        let _ = slot.push_str(line);
        self.record = (self.record + 1) % HISTORY_DEPTH;
        if self.number < HISTORY_DEPTH {
            self.number += 1;
        }
    }

    /// Number of stored lines.
    pub fn len(&self) -> usize {
        self.number
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.number == 0
    }

    /// Current navigation offset, in `[-len(), 0]`.
    pub fn offset(&self) -> i16 {
        self.offset
    }

    /// Step the navigation offset by `delta` and return the selected
    /// line, or `None` when the offset lands back on the live buffer.
    ///
    /// The offset clamps to the stored range, so stepping past either
    /// end holds position.
    pub fn navigate(&mut self, delta: i16) -> Option<&str> {
        let floor = -(self.number as i16);
        self.offset = (self.offset + delta).clamp(floor, 0);
        if self.offset == 0 {
            None
        } else {
            let index =
                (self.record as i16 + self.offset + HISTORY_DEPTH as i16) as usize % HISTORY_DEPTH;
            Some(&self.items[index])
        }
    }

    /// Drop back to the live buffer.
    pub fn reset_offset(&mut self) {
        self.offset = 0;
    }

    fn latest(&self) -> &str {
        &self.items[(self.record + HISTORY_DEPTH - 1) % HISTORY_DEPTH]
    }
}

impl core::fmt::Debug for History {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("History")
            .field("number", &self.number)
            .field("record", &self.record)
            .field("offset", &self.offset)
            .finish()
    }
}

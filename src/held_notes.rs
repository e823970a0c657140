// src/held_notes.rs

/// Most pitches that can be held without the set reallocating.
pub const MAX_HELD_NOTES: usize = 128;

/// The input pitches currently held down, in the order they were pressed.
///
/// The first held pitch is what note number 0 of a pattern plays. Note
/// numbers past the end reuse the held pitches cyclically.
///
/// Responsibilities:
/// - keep insertion order
/// - ignore duplicate presses and stray releases
///
/// Does NOT:
/// - allocate while fewer than [`MAX_HELD_NOTES`] pitches are held
#[derive(Debug, Clone)]
pub struct HeldNoteSet {
    pitches: Vec<i32>,
}

impl HeldNoteSet {
    pub fn new() -> Self {
        Self {
            pitches: Vec::with_capacity(MAX_HELD_NOTES),
        }
    }

    /// Hold a pitch. No-op if it is already held.
    pub fn add(&mut self, pitch: i32) {
        if !self.contains(pitch) {
            self.pitches.push(pitch);
        }
    }

    /// Release a pitch. No-op if it is not held.
    pub fn remove(&mut self, pitch: i32) {
        if let Some(pos) = self.pitches.iter().position(|&p| p == pitch) {
            self.pitches.remove(pos);
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pitches.len()
    }

    /// The held pitch for `index`, wrapping modulo the number held.
    ///
    /// Returns None when nothing is held.
    #[inline]
    pub fn get(&self, index: i64) -> Option<i32> {
        if self.pitches.is_empty() {
            return None;
        }
        let len = self.pitches.len() as i64;
        Some(self.pitches[index.rem_euclid(len) as usize])
    }

    pub fn contains(&self, pitch: i32) -> bool {
        self.pitches.contains(&pitch)
    }

    pub fn clear(&mut self) {
        self.pitches.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.pitches.iter().copied()
    }
}

impl Default for HeldNoteSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_kept() {
        let mut held = HeldNoteSet::new();
        held.add(64);
        held.add(60);
        held.add(67);
        assert_eq!(held.iter().collect::<Vec<_>>(), vec![64, 60, 67]);
    }

    #[test]
    fn test_duplicates_and_stray_releases() {
        let mut held = HeldNoteSet::new();
        held.add(60);
        held.add(60);
        assert_eq!(held.len(), 1);

        held.remove(62);
        assert_eq!(held.len(), 1);

        assert!(held.contains(60));

        held.remove(60);
        assert!(held.is_empty());
        assert!(!held.contains(60));
    }

    #[test]
    fn test_get_wraps() {
        let mut held = HeldNoteSet::new();
        assert_eq!(held.get(0), None);

        held.add(60);
        held.add(64);
        assert_eq!(held.get(0), Some(60));
        assert_eq!(held.get(3), Some(64));
        assert_eq!(held.get(-1), Some(64));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut held = HeldNoteSet::new();
        for p in [60, 62, 64, 65] {
            held.add(p);
        }
        held.remove(62);
        assert_eq!(held.iter().collect::<Vec<_>>(), vec![60, 64, 65]);
    }
}

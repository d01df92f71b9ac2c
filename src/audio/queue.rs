use rand::{seq::SliceRandom, Rng};
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use crate::{
    audio::track::Track,
    error::{MusicError, MusicResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Normal,
    LoopOne,
    LoopAll,
}

impl LoopMode {
    pub fn describe(&self) -> &'static str {
        match self {
            LoopMode::Normal => "off",
            LoopMode::LoopOne => "current track",
            LoopMode::LoopAll => "all tracks",
        }
    }
}

/// Ordered backlog of tracks waiting to be played.
///
/// Indices are 0-based. Every index-taking operation validates before it
/// touches the buffer, so a failed call leaves the queue exactly as it was.
#[derive(Debug, Default)]
pub struct MusicQueue {
    items: VecDeque<Track>,
    mode: LoopMode,
}

impl MusicQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un track al final de la cola
    pub fn enqueue(&mut self, track: Track) {
        debug!("➕ Agregado a la cola: {}", track.title());
        self.items.push_back(track);
    }

    /// Agrega múltiples tracks (playlist) respetando su orden
    pub fn enqueue_many(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let before = self.items.len();
        self.items.extend(tracks);
        let added = self.items.len() - before;
        info!("➕ Agregadas {} canciones a la cola", added);
        added
    }

    pub fn dequeue_front(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    #[allow(dead_code)]
    pub fn peek_front(&self) -> Option<&Track> {
        self.items.front()
    }

    /// Puts a track back at the head, used when a hand-off to the backend fails.
    pub(crate) fn push_front(&mut self, track: Track) {
        self.items.push_front(track);
    }

    pub fn remove_at(&mut self, index: usize) -> MusicResult<Track> {
        self.check_index(index)?;
        let removed = self
            .items
            .remove(index)
            .ok_or(MusicError::IndexOutOfRange { index, len: self.items.len() })?;
        debug!("❌ Track eliminado en posición {}", index);
        Ok(removed)
    }

    #[allow(dead_code)]
    pub fn insert_at(&mut self, index: usize, track: Track) -> MusicResult<()> {
        self.check_index(index)?;
        self.items.insert(index, track);
        Ok(())
    }

    /// Mueve un track a una nueva posición.
    ///
    /// `to` is the position the track ends up at once it has been taken out,
    /// i.e. an index into the `len - 1` sequence, which is why both indices
    /// share the `0..len` range.
    pub fn move_track(&mut self, from: usize, to: usize) -> MusicResult<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from == to {
            return Err(MusicError::InvalidIndex { from, to });
        }

        let item = self
            .items
            .remove(from)
            .ok_or(MusicError::IndexOutOfRange { index: from, len: self.items.len() })?;
        self.items.insert(to, item);
        debug!("📍 Track movido de posición {} a {}", from, to);
        Ok(())
    }

    #[allow(dead_code)]
    pub fn swap(&mut self, i: usize, j: usize) -> MusicResult<()> {
        self.check_index(i)?;
        self.check_index(j)?;
        if i == j {
            return Err(MusicError::SameIndex(i));
        }
        self.items.swap(i, j);
        Ok(())
    }

    /// Discards everything before `index`, leaving that track at the front.
    pub fn skip_to(&mut self, index: usize) -> MusicResult<usize> {
        self.check_index(index)?;
        self.items.drain(..index);
        debug!("⏭️ Descartados {} tracks antes de la posición {}", index, index);
        Ok(index)
    }

    /// Mezcla la cola
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::thread_rng());
    }

    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.items.len() <= 1 {
            return;
        }
        // Fisher-Yates sobre el buffer contiguo
        self.items.make_contiguous().shuffle(rng);
        info!("🔀 Cola mezclada");
    }

    /// Cambia el modo de loop
    pub fn set_mode(&mut self, mode: LoopMode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        match mode {
            LoopMode::Normal => info!("➡️ Repetición desactivada"),
            LoopMode::LoopOne => info!("🔂 Repetir canción activado"),
            LoopMode::LoopAll => info!("🔁 Repetir cola activado"),
        }
    }

    pub fn mode(&self) -> LoopMode {
        self.mode
    }

    /// Limpia la cola
    pub fn clear(&mut self) {
        self.items.clear();
        info!("🗑️ Cola limpiada");
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[allow(dead_code)]
    pub fn get(&self, index: usize) -> Option<&Track> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    /// Point-in-time copy of the rendered titles, for the queue view.
    pub fn titles(&self) -> Vec<String> {
        self.iter().map(Track::display_title).collect()
    }

    /// Duración total de los tracks con duración conocida
    pub fn total_duration(&self) -> Duration {
        self.iter().filter_map(Track::duration).sum()
    }

    fn check_index(&self, index: usize) -> MusicResult<()> {
        if index >= self.len() {
            return Err(MusicError::IndexOutOfRange { index, len: self.len() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashMap;

    fn track(title: &str) -> Track {
        Track::new(format!("https://example.com/{title}"), title, "artist")
    }

    fn queue_of(titles: &[&str]) -> MusicQueue {
        let mut queue = MusicQueue::new();
        queue.enqueue_many(titles.iter().map(|t| track(t)));
        queue
    }

    fn titles(queue: &MusicQueue) -> Vec<&str> {
        queue.iter().map(Track::title).collect()
    }

    #[test]
    fn dequeue_front_returns_former_head_and_shrinks_by_one() {
        let mut queue = queue_of(&["a", "b", "c"]);

        let head = queue.dequeue_front().unwrap();

        assert_eq!(head.title(), "a");
        assert_eq!(queue.len(), 2);
        assert_eq!(titles(&queue), vec!["b", "c"]);
    }

    #[test]
    fn dequeue_and_peek_on_empty_queue() {
        let mut queue = MusicQueue::new();
        assert!(queue.peek_front().is_none());
        assert!(queue.dequeue_front().is_none());
    }

    #[test]
    fn duplicates_are_independent_entries() {
        let mut queue = MusicQueue::new();
        queue.enqueue(track("same"));
        queue.enqueue(track("same"));
        assert_eq!(queue.len(), 2);

        queue.remove_at(0).unwrap();
        assert_eq!(titles(&queue), vec!["same"]);
    }

    #[test]
    fn index_equal_to_length_is_out_of_range() {
        let mut queue = queue_of(&["a", "b", "c"]);

        assert!(matches!(
            queue.remove_at(3),
            Err(MusicError::IndexOutOfRange { index: 3, len: 3 })
        ));
        assert!(matches!(
            queue.insert_at(3, track("x")),
            Err(MusicError::IndexOutOfRange { .. })
        ));
        assert_eq!(titles(&queue), vec!["a", "b", "c"]);
    }

    #[test]
    fn insert_at_places_track_before_existing_one() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.insert_at(1, track("x")).unwrap();
        assert_eq!(titles(&queue), vec!["a", "x", "b", "c"]);
    }

    #[test]
    fn move_track_lands_at_target_position() {
        let mut queue = queue_of(&["a", "b", "c", "d", "e"]);

        queue.move_track(0, 3).unwrap();
        assert_eq!(titles(&queue), vec!["b", "c", "d", "a", "e"]);

        queue.move_track(4, 0).unwrap();
        assert_eq!(titles(&queue), vec!["e", "b", "c", "d", "a"]);
    }

    #[test]
    fn move_track_preserves_multiset_for_every_valid_pair() {
        let original = ["a", "b", "c", "d", "e", "f"];
        for from in 0..original.len() {
            for to in 0..original.len() {
                if from == to {
                    continue;
                }
                let mut queue = queue_of(&original);
                queue.move_track(from, to).unwrap();

                assert_eq!(queue.len(), original.len());
                assert_eq!(queue.get(to).unwrap().title(), original[from]);

                let mut sorted = titles(&queue);
                sorted.sort_unstable();
                assert_eq!(sorted, original.to_vec());
            }
        }
    }

    #[test]
    fn move_track_rejects_same_and_out_of_range_indices() {
        let mut queue = queue_of(&["a", "b"]);

        assert!(matches!(queue.move_track(1, 1), Err(MusicError::InvalidIndex { from: 1, to: 1 })));
        assert!(matches!(queue.move_track(0, 2), Err(MusicError::IndexOutOfRange { .. })));
        assert!(matches!(queue.move_track(5, 0), Err(MusicError::IndexOutOfRange { .. })));
        assert_eq!(titles(&queue), vec!["a", "b"]);
    }

    #[test]
    fn single_track_queue_rejects_swap_and_move() {
        let mut queue = queue_of(&["only"]);

        assert!(matches!(queue.swap(0, 0), Err(MusicError::SameIndex(0))));
        assert!(matches!(queue.move_track(0, 0), Err(MusicError::InvalidIndex { .. })));
        assert_eq!(titles(&queue), vec!["only"]);
    }

    #[test]
    fn swap_exchanges_two_tracks() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.swap(0, 2).unwrap();
        assert_eq!(titles(&queue), vec!["c", "b", "a"]);

        assert!(matches!(queue.swap(0, 3), Err(MusicError::IndexOutOfRange { .. })));
        assert_eq!(titles(&queue), vec!["c", "b", "a"]);
    }

    #[test]
    fn skip_to_discards_everything_before_target() {
        let mut queue = queue_of(&["a", "b", "c", "d", "e"]);

        assert!(matches!(queue.skip_to(5), Err(MusicError::IndexOutOfRange { index: 5, len: 5 })));
        assert_eq!(titles(&queue), vec!["a", "b", "c", "d", "e"]);

        assert_eq!(queue.skip_to(2).unwrap(), 2);
        assert_eq!(titles(&queue), vec!["c", "d", "e"]);
    }

    #[test]
    fn shuffle_is_noop_on_short_queues() {
        let mut empty = MusicQueue::new();
        empty.shuffle();
        assert!(empty.is_empty());

        let mut single = queue_of(&["only"]);
        single.shuffle();
        assert_eq!(titles(&single), vec!["only"]);
    }

    #[test]
    fn shuffle_distribution_is_uniform() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut counts: HashMap<Vec<String>, usize> = HashMap::new();
        let trials = 6000;

        for _ in 0..trials {
            let mut queue = queue_of(&["a", "b", "c"]);
            queue.shuffle_with(&mut rng);
            let order = queue.iter().map(|t| t.title().to_string()).collect();
            *counts.entry(order).or_default() += 1;
        }

        // 3! órdenes posibles, ~1000 cada uno
        assert_eq!(counts.len(), 6);
        for (order, count) in counts {
            assert!((800..=1200).contains(&count), "{order:?} appeared {count} times");
        }
    }

    #[test]
    fn loop_modes_are_mutually_exclusive() {
        let mut queue = MusicQueue::new();
        assert_eq!(queue.mode(), LoopMode::Normal);

        queue.set_mode(LoopMode::LoopOne);
        queue.set_mode(LoopMode::LoopAll);
        assert_eq!(queue.mode(), LoopMode::LoopAll);

        queue.set_mode(LoopMode::LoopAll);
        assert_eq!(queue.mode(), LoopMode::LoopAll);

        queue.set_mode(LoopMode::Normal);
        assert_eq!(queue.mode(), LoopMode::Normal);
    }

    #[test]
    fn clear_succeeds_on_empty_queue() {
        let mut queue = MusicQueue::new();
        queue.clear();
        assert!(queue.is_empty());

        let mut queue = queue_of(&["a", "b"]);
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn total_duration_ignores_unbounded_tracks() {
        let mut queue = MusicQueue::new();
        queue.enqueue(track("a").with_duration_ms(60_000));
        queue.enqueue(track("live"));
        queue.enqueue(track("b").with_duration_ms(30_000));

        assert_eq!(queue.total_duration(), Duration::from_secs(90));
    }
}

use tokio::task::JoinHandle;

use crate::camera::Photo;

/// Buffered introduction conversation.
///
/// Entered by the Remember intent, left either on a farewell line or on
/// timeout, whichever fires first. Exit is exclusive: the `active` flag
/// flips synchronously at the start of [`Collection::finish`], so the
/// losing trigger becomes a no-op.
#[derive(Debug, Default)]
pub struct Collection {
    active: bool,
    buffer: Vec<String>,
    photo: Option<Photo>,
    timeout: Option<JoinHandle<()>>,
    generation: u64,
}

impl Collection {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Current activation generation. Timer and late-capture messages
    /// carry the generation they were scheduled under; a mismatch means
    /// they outlived their collection and must be ignored.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a new collection, invalidating any stale timer or capture.
    pub fn begin(&mut self) -> u64 {
        self.cancel_timeout();
        self.active = true;
        self.buffer.clear();
        self.photo = None;
        self.generation += 1;
        self.generation
    }

    pub fn set_timeout(&mut self, handle: JoinHandle<()>) {
        self.cancel_timeout();
        self.timeout = Some(handle);
    }

    pub fn push_line(&mut self, line: &str) {
        if self.active {
            self.buffer.push(line.to_string());
        }
    }

    pub fn set_photo(&mut self, photo: Photo) {
        if self.active {
            self.photo = Some(photo);
        }
    }

    pub fn has_photo(&self) -> bool {
        self.photo.is_some()
    }

    /// End the collection, handing back the joined conversation and the
    /// photo if one arrived. Only the first caller gets them; buffer and
    /// photo are cleared unconditionally and the timer cancelled.
    pub fn finish(&mut self) -> Option<(String, Option<Photo>)> {
        if !self.active {
            return None;
        }
        self.active = false;
        self.cancel_timeout();
        let conversation = self.buffer.drain(..).collect::<Vec<_>>().join(" ");
        let photo = self.photo.take();
        Some((conversation, photo))
    }

    fn cancel_timeout(&mut self) {
        if let Some(handle) = self.timeout.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_buffered_lines_with_spaces() {
        let mut collection = Collection::default();
        collection.begin();
        collection.push_line("I'm Mark");
        collection.push_line("I work at Acme");
        collection.push_line("nice to meet you");
        let (conversation, photo) = collection.finish().unwrap();
        assert_eq!(conversation, "I'm Mark I work at Acme nice to meet you");
        assert_eq!(photo, None);
    }

    #[test]
    fn finish_is_idempotent() {
        let mut collection = Collection::default();
        collection.begin();
        collection.push_line("hello");
        assert!(collection.finish().is_some());
        assert!(collection.finish().is_none());
        assert!(!collection.is_active());
    }

    #[test]
    fn lines_and_photos_are_dropped_while_inactive() {
        let mut collection = Collection::default();
        collection.push_line("ignored");
        collection.set_photo(Photo {
            bytes: vec![1],
            label: "late".into(),
        });
        collection.begin();
        let (conversation, photo) = collection.finish().unwrap();
        assert_eq!(conversation, "");
        assert_eq!(photo, None);
    }

    #[test]
    fn begin_bumps_generation_and_clears_state() {
        let mut collection = Collection::default();
        let first = collection.begin();
        collection.push_line("line");
        collection.set_photo(Photo {
            bytes: vec![1],
            label: "p".into(),
        });
        let second = collection.begin();
        assert!(second > first);
        let (conversation, photo) = collection.finish().unwrap();
        assert_eq!(conversation, "");
        assert_eq!(photo, None);
    }
}

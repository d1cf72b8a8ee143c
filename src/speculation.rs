use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::camera::{Camera, Photo, PhotoQuality};
use crate::intent::{SpeculativeKind, classify_speculative};
use crate::name::extract_name;
use crate::store::{PersonRecord, PersonStore};

/// Work started on unconfirmed partial input, held until the closing
/// final transcript reconciles it.
///
/// At most one speculation exists at a time; it is a handle, not a value,
/// so holding it never blocks further transcript events. The next final
/// event always consumes it, one way or another.
#[derive(Debug, Default)]
pub enum Speculation {
    #[default]
    Idle,
    /// A photo capture launched for a likely Recognize or Remember.
    Photo {
        kind: SpeculativeKind,
        task: JoinHandle<anyhow::Result<Photo>>,
    },
    /// A person search launched for a likely Query, keyed by the name
    /// the partial transcript yielded.
    Search {
        name: String,
        task: JoinHandle<anyhow::Result<Option<PersonRecord>>>,
    },
}

impl Speculation {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Consider a partial transcript for speculative work.
    ///
    /// A second candidate while one speculation is pending is dropped,
    /// never queued. A Query candidate without an extractable name
    /// launches nothing.
    pub fn consider(
        &mut self,
        partial: &str,
        camera: &Arc<dyn Camera>,
        store: &Arc<dyn PersonStore>,
        user_id: &str,
    ) {
        if !self.is_idle() {
            return;
        }
        let Some(kind) = classify_speculative(partial) else {
            return;
        };
        match kind {
            SpeculativeKind::Recognize | SpeculativeKind::Remember => {
                let quality = if kind == SpeculativeKind::Recognize {
                    PhotoQuality::Medium
                } else {
                    PhotoQuality::Low
                };
                debug!(?kind, "speculative capture");
                let camera = camera.clone();
                let task = tokio::spawn(async move { camera.capture(quality).await });
                *self = Self::Photo { kind, task };
            }
            SpeculativeKind::Query => {
                let Some(name) = extract_name(partial) else {
                    return;
                };
                debug!(%name, "speculative search");
                let store = store.clone();
                let user = user_id.to_string();
                let query = name.clone();
                let task = tokio::spawn(async move { store.search(&query, &user).await });
                *self = Self::Search { name, task };
            }
        }
    }

    /// Hand the pending work to the caller, resetting to idle.
    pub fn take(&mut self) -> Speculation {
        std::mem::take(self)
    }

    /// The pending photo task, if that is what is in flight. Any pending
    /// search is aborted and dropped.
    pub fn into_photo_task(self) -> Option<JoinHandle<anyhow::Result<Photo>>> {
        match self {
            Self::Photo { task, .. } => Some(task),
            Self::Search { task, .. } => {
                task.abort();
                None
            }
            Self::Idle => None,
        }
    }

    /// The pending search and the name it was launched for. Any pending
    /// photo capture is aborted and dropped.
    pub fn into_search(self) -> Option<(String, JoinHandle<anyhow::Result<Option<PersonRecord>>>)> {
        match self {
            Self::Search { name, task } => Some((name, task)),
            Self::Photo { task, .. } => {
                task.abort();
                None
            }
            Self::Idle => None,
        }
    }

    pub fn discard(self) {
        match self {
            Self::Photo { task, .. } => task.abort(),
            Self::Search { task, .. } => task.abort(),
            Self::Idle => {}
        }
    }
}

/// Resolve a photo from an optional pending speculative capture, falling
/// back to a fresh attempt when there is none or it failed.
///
/// A speculative failure is never surfaced on its own; it only downgrades
/// to the fresh attempt, whose error the caller owns. Exactly one photo
/// comes out of a successful call.
pub async fn settle_photo<F>(
    pending: Option<JoinHandle<anyhow::Result<Photo>>>,
    fresh: impl FnOnce() -> F,
) -> anyhow::Result<Photo>
where
    F: Future<Output = anyhow::Result<Photo>>,
{
    if let Some(task) = pending {
        match task.await {
            Ok(Ok(photo)) => return Ok(photo),
            Ok(Err(e)) => warn!(error = %e, "speculative capture failed, retrying"),
            Err(e) => warn!(error = %e, "speculative capture task lost"),
        }
    }
    fresh().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCamera {
        captures: AtomicUsize,
    }

    #[async_trait]
    impl Camera for CountingCamera {
        async fn capture(&self, quality: PhotoQuality) -> anyhow::Result<Photo> {
            self.captures.fetch_add(1, Ordering::SeqCst);
            Ok(Photo {
                bytes: vec![0],
                label: format!("capture-{}", quality.as_str()),
            })
        }
    }

    struct CountingStore {
        searches: AtomicUsize,
    }

    #[async_trait]
    impl PersonStore for CountingStore {
        async fn create(
            &self,
            _photo: &Photo,
            _user_id: &str,
            _name: Option<&str>,
            _context: &str,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn search(&self, _name: &str, _user_id: &str) -> anyhow::Result<Option<PersonRecord>> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn delete(&self, _name: &str, _user_id: &str) -> anyhow::Result<bool> {
            Ok(false)
        }
    }

    fn collaborators() -> (Arc<CountingCamera>, Arc<CountingStore>) {
        (
            Arc::new(CountingCamera {
                captures: AtomicUsize::new(0),
            }),
            Arc::new(CountingStore {
                searches: AtomicUsize::new(0),
            }),
        )
    }

    #[tokio::test]
    async fn only_the_first_speculatable_partial_launches() {
        let (camera, store) = collaborators();
        let cam: Arc<dyn Camera> = camera.clone();
        let st: Arc<dyn PersonStore> = store.clone();
        let mut spec = Speculation::default();
        spec.consider("who is this", &cam, &st, "u");
        spec.consider("who is this person next", &cam, &st, "u");
        spec.consider("tell me about mark", &cam, &st, "u");
        assert!(matches!(spec, Speculation::Photo { .. }));
        spec.take().into_photo_task().unwrap().await.unwrap().unwrap();
        assert_eq!(camera.captures.load(Ordering::SeqCst), 1);
        assert_eq!(store.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn query_partial_without_a_name_launches_nothing() {
        let (camera, store) = collaborators();
        let cam: Arc<dyn Camera> = camera;
        let st: Arc<dyn PersonStore> = store.clone();
        let mut spec = Speculation::default();
        spec.consider("tell me about", &cam, &st, "u");
        assert!(spec.is_idle());
    }

    #[tokio::test]
    async fn query_partial_with_name_launches_search() {
        let (camera, store) = collaborators();
        let cam: Arc<dyn Camera> = camera;
        let st: Arc<dyn PersonStore> = store.clone();
        let mut spec = Speculation::default();
        spec.consider("tell me about john", &cam, &st, "u");
        let (name, task) = spec.take().into_search().unwrap();
        assert_eq!(name, "John");
        task.await.unwrap().unwrap();
        assert_eq!(store.searches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn settle_photo_prefers_pending_success() {
        let pending = tokio::spawn(async {
            Ok(Photo {
                bytes: vec![7],
                label: "speculative".into(),
            })
        });
        let photo = settle_photo(Some(pending), || async {
            panic!("fresh attempt must not run")
        })
        .await
        .unwrap();
        assert_eq!(photo.label, "speculative");
    }

    #[tokio::test]
    async fn settle_photo_falls_back_on_pending_failure() {
        let pending =
            tokio::spawn(async { Err::<Photo, _>(anyhow::anyhow!("lens cap on")) });
        let photo = settle_photo(Some(pending), || async {
            Ok(Photo {
                bytes: vec![1],
                label: "fresh".into(),
            })
        })
        .await
        .unwrap();
        assert_eq!(photo.label, "fresh");
    }

    #[tokio::test]
    async fn settle_photo_with_nothing_pending_goes_fresh() {
        let photo = settle_photo(None, || async {
            Ok(Photo {
                bytes: vec![1],
                label: "fresh".into(),
            })
        })
        .await
        .unwrap();
        assert_eq!(photo.label, "fresh");
    }
}

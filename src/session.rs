use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::camera::{Camera, Photo, PhotoQuality};
use crate::collector::Collection;
use crate::extract::{Extractor, PersonDetails};
use crate::intent::{Intent, classify, is_farewell};
use crate::speculation::{Speculation, settle_photo};
use crate::speech::{Speech, speak_detached};
use crate::store::{PersonRecord, PersonStore, Recognizer};
use crate::transcript::TranscriptEvent;

/// Everything the session loop consumes.
///
/// Timer expiry and late photo captures are ordinary messages, so every
/// state change happens on the one event-handling task and the collector
/// never races its own timeout.
#[derive(Debug)]
pub enum SessionEvent {
    Transcript(TranscriptEvent),
    CollectTimeout { generation: u64 },
    PhotoCaptured { generation: u64, photo: Photo },
}

/// External collaborators the session calls out to.
#[derive(Clone)]
pub struct Collaborators {
    pub camera: Arc<dyn Camera>,
    pub speech: Arc<dyn Speech>,
    pub extractor: Arc<dyn Extractor>,
    pub store: Arc<dyn PersonStore>,
    pub recognizer: Arc<dyn Recognizer>,
}

/// Per-user dispatcher.
///
/// Owns the speculation and collection state for the lifetime of one
/// session and processes one event to completion before the next, which
/// is why none of the state needs a lock.
pub struct Session {
    user_id: String,
    collaborators: Collaborators,
    events: mpsc::Sender<SessionEvent>,
    collect_timeout: Duration,
    speculation: Speculation,
    collection: Collection,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        collaborators: Collaborators,
        events: mpsc::Sender<SessionEvent>,
        collect_timeout: Duration,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            collaborators,
            events,
            collect_timeout,
            speculation: Speculation::default(),
            collection: Collection::default(),
        }
    }

    /// Drive the session until the event channel closes.
    pub async fn run(mut self, mut rx: mpsc::Receiver<SessionEvent>) {
        info!(user_id = %self.user_id, "session started");
        while let Some(event) = rx.recv().await {
            self.handle_event(event).await;
        }
        info!(user_id = %self.user_id, "session ended");
    }

    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Transcript(t) if t.is_final => self.handle_final(&t.text).await,
            SessionEvent::Transcript(t) => self.handle_partial(&t.text),
            SessionEvent::CollectTimeout { generation } => {
                if self.collection.is_active() && self.collection.generation() == generation {
                    info!("collection timed out");
                    self.finish_collection().await;
                } else {
                    debug!(generation, "stale collection timer");
                }
            }
            SessionEvent::PhotoCaptured { generation, photo } => {
                if self.collection.is_active() && self.collection.generation() == generation {
                    debug!("background capture attached to collection");
                    self.collection.set_photo(photo);
                } else {
                    debug!(generation, "dropping capture for finished collection");
                }
            }
        }
    }

    /// Partial transcripts only ever feed speculation, and never while a
    /// collection is underway.
    fn handle_partial(&mut self, text: &str) {
        if self.collection.is_active() {
            return;
        }
        self.speculation.consider(
            text,
            &self.collaborators.camera,
            &self.collaborators.store,
            &self.user_id,
        );
    }

    /// A final transcript closes the utterance: consume any speculation
    /// and route to exactly one workflow, or append to the collection.
    async fn handle_final(&mut self, text: &str) {
        let speculation = self.speculation.take();
        if self.collection.is_active() {
            // No speculation can pend mid-collection; the take above is
            // just the invariant that a final always clears it.
            speculation.discard();
            self.collection.push_line(text);
            if is_farewell(text) {
                info!("farewell detected, ending collection");
                self.finish_collection().await;
            }
            return;
        }
        match classify(text) {
            Some(Intent::Recognize) => self.run_recognize(speculation).await,
            Some(Intent::Query { name }) => self.run_query(name, speculation).await,
            Some(Intent::Delete { name }) => {
                speculation.discard();
                self.run_delete(name).await;
            }
            Some(Intent::Remember) => self.run_remember(speculation).await,
            None => speculation.discard(),
        }
    }

    async fn run_recognize(&mut self, speculation: Speculation) {
        let camera = self.collaborators.camera.clone();
        let photo = settle_photo(speculation.into_photo_task(), || async move {
            camera.capture(PhotoQuality::High).await
        })
        .await;
        let photo = match photo {
            Ok(photo) => photo,
            Err(e) => {
                error!(error = %e, "photo capture failed");
                self.say("Sorry, I couldn't get a good look at them.");
                return;
            }
        };
        match self
            .collaborators
            .recognizer
            .recognize(&photo, &self.user_id)
            .await
        {
            Ok(recognition) if recognition.recognized => {
                let line = recognition
                    .person
                    .map(|p| describe_person(&p))
                    .unwrap_or_else(|| "You've met them, but I have no details.".to_string());
                self.say(line);
            }
            Ok(_) => self.say("I don't think you've met this person before."),
            Err(e) => {
                error!(error = %e, "recognition failed");
                self.say("Sorry, I couldn't recognize who you're looking at.");
            }
        }
    }

    async fn run_query(&mut self, final_name: Option<String>, speculation: Speculation) {
        let pending = speculation.into_search();
        // A final that yields no name falls back to the name the
        // speculative search launched with.
        let Some(name) = final_name.or_else(|| pending.as_ref().map(|(n, _)| n.clone())) else {
            self.say("Sorry, I didn't catch the name.");
            return;
        };
        let result = match pending {
            // Reuse the pre-fetched result only when it was launched for
            // the same name; a partial-to-final revision can change the
            // subject entirely.
            Some((spec_name, task)) if spec_name == name => match task.await {
                Ok(Ok(found)) => Ok(found),
                Ok(Err(e)) => {
                    warn!(error = %e, "speculative search failed, retrying");
                    self.collaborators.store.search(&name, &self.user_id).await
                }
                Err(e) => {
                    warn!(error = %e, "speculative search task lost");
                    self.collaborators.store.search(&name, &self.user_id).await
                }
            },
            Some((stale, task)) => {
                debug!(%stale, %name, "discarding speculative search for changed name");
                task.abort();
                self.collaborators.store.search(&name, &self.user_id).await
            }
            None => self.collaborators.store.search(&name, &self.user_id).await,
        };
        match result {
            Ok(Some(person)) => self.say(describe_person(&person)),
            Ok(None) => self.say(format!("I don't have any information about {name}.")),
            Err(e) => {
                error!(error = %e, "lookup failed");
                self.say("Sorry, I couldn't look that up right now.");
            }
        }
    }

    async fn run_delete(&mut self, name: Option<String>) {
        let Some(name) = name else {
            self.say("Sorry, I didn't catch the name.");
            return;
        };
        match self.collaborators.store.delete(&name, &self.user_id).await {
            Ok(true) => self.say(format!("Okay, I've forgotten about {name}.")),
            Ok(false) => self.say(format!("I don't know anyone called {name}.")),
            Err(e) => {
                error!(error = %e, "delete failed");
                self.say(format!("Sorry, I couldn't forget about {name}."));
            }
        }
    }

    /// The only workflow that doesn't speak on its own: the response
    /// comes when the collection ends.
    async fn run_remember(&mut self, speculation: Speculation) {
        let generation = self.collection.begin();
        match speculation.into_photo_task() {
            Some(task) if task.is_finished() => match task.await {
                Ok(Ok(photo)) => {
                    debug!("reusing speculative capture for collection");
                    self.collection.set_photo(photo);
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "speculative capture failed");
                    self.spawn_capture(generation);
                }
                Err(e) => {
                    warn!(error = %e, "speculative capture task lost");
                    self.spawn_capture(generation);
                }
            },
            Some(task) => {
                // Still in flight at final time; drop it for a fresh
                // background capture the collector can pick up later.
                task.abort();
                self.spawn_capture(generation);
            }
            None => self.spawn_capture(generation),
        }
        let events = self.events.clone();
        let timeout = self.collect_timeout;
        self.collection.set_timeout(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(SessionEvent::CollectTimeout { generation }).await;
        }));
        info!("collecting introduction conversation");
    }

    /// Detached capture whose result re-enters the loop as a message.
    fn spawn_capture(&self, generation: u64) {
        let camera = self.collaborators.camera.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            match camera.capture(PhotoQuality::Low).await {
                Ok(photo) => {
                    let _ = events
                        .send(SessionEvent::PhotoCaptured { generation, photo })
                        .await;
                }
                Err(e) => warn!(error = %e, "background capture failed"),
            }
        });
    }

    /// Shared exit action for the farewell and timeout paths. Only the
    /// first caller past [`Collection::finish`] does anything.
    async fn finish_collection(&mut self) {
        let Some((conversation, photo)) = self.collection.finish() else {
            return;
        };
        debug!(chars = conversation.len(), "collection ended");
        let details = match self.collaborators.extractor.extract(&conversation).await {
            Ok(details) => details,
            Err(e) => {
                warn!(error = %e, "extraction failed, proceeding without details");
                PersonDetails::default()
            }
        };
        let Some(photo) = photo else {
            self.say("Sorry, I couldn't capture a photo of them.");
            return;
        };
        let context = details.synthesized_context();
        match self
            .collaborators
            .store
            .create(&photo, &self.user_id, details.name.as_deref(), &context)
            .await
        {
            Ok(()) => {
                let who = details.name.as_deref().unwrap_or("them");
                self.say(format!("Okay, I'll remember {who}."));
            }
            Err(e) => {
                error!(error = %e, "saving person failed");
                self.say("Sorry, I couldn't save that right now.");
            }
        }
    }

    fn say(&self, text: impl Into<String>) {
        speak_detached(&self.collaborators.speech, text);
    }
}

fn describe_person(person: &PersonRecord) -> String {
    let name = person.name.as_deref().unwrap_or("someone you've met");
    let mut line = format!("This is {name}.");
    if let Some(context) = person
        .conversation_context
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        line.push(' ');
        line.push_str(context);
        if !context.ends_with(['.', '!', '?']) {
            line.push('.');
        }
    }
    if person.times_met > 1 {
        line.push_str(&format!(" You've met {} times.", person.times_met));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_includes_context_and_meeting_count() {
        let person = PersonRecord {
            name: Some("Mark".into()),
            conversation_context: Some("Workplace: Acme | Details: likes rust".into()),
            first_met_at: None,
            last_seen_at: None,
            times_met: 3,
        };
        assert_eq!(
            describe_person(&person),
            "This is Mark. Workplace: Acme | Details: likes rust. You've met 3 times."
        );
    }

    #[test]
    fn description_degrades_without_context() {
        let person = PersonRecord {
            name: Some("Jane".into()),
            conversation_context: None,
            first_met_at: None,
            last_seen_at: None,
            times_met: 1,
        };
        assert_eq!(describe_person(&person), "This is Jane.");
    }
}

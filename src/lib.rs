pub mod camera;
pub mod collector;
pub mod extract;
pub mod intent;
pub mod name;
pub mod session;
pub mod speculation;
pub mod speech;
pub mod store;
pub mod transcript;

pub use camera::{Camera, HttpCamera, Photo, PhotoQuality};
pub use extract::{Extractor, OllamaExtractor, PersonDetails};
pub use intent::{Intent, classify, is_farewell};
pub use name::extract_name;
pub use session::{Collaborators, Session, SessionEvent};
pub use speech::{CoquiSpeech, Speech, speak_detached};
pub use store::{PersonRecord, PersonStore, Recognition, Recognizer, VisageBackend};
pub use transcript::TranscriptEvent;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use visage::{
    Collaborators, CoquiSpeech, HttpCamera, OllamaExtractor, Session, VisageBackend, transcript,
};

#[derive(Parser, Debug)]
#[command(name = "visage", about = "Voice agent for the Visage person-memory backend")]
struct Cli {
    /// Unix socket to listen on for transcript JSON lines
    #[arg(long, env = "VISAGE_LISTEN", default_value = "/run/visage/asr.sock")]
    listen: PathBuf,

    /// Base URL of the Visage backend
    #[arg(long, env = "VISAGE_BACKEND_URL", default_value = "http://localhost:8000")]
    backend_url: String,

    /// Bearer token for the Visage backend
    #[arg(long, env = "VISAGE_BACKEND_TOKEN")]
    backend_token: String,

    /// Base URL of the wearable camera bridge
    #[arg(long, env = "VISAGE_CAMERA_URL", default_value = "http://localhost:8090")]
    camera_url: String,

    /// Base URL of the coqui TTS server
    #[arg(long, env = "VISAGE_TTS_URL", default_value = "http://localhost:5002")]
    tts_url: String,

    /// TTS speaker id
    #[arg(long, default_value = "p330")]
    speaker_id: String,

    /// TTS language id
    #[arg(long, default_value = "")]
    language_id: String,

    /// Ollama server used for conversation extraction
    #[arg(long, env = "VISAGE_OLLAMA_URL", default_value = "http://localhost:11434")]
    ollama_url: String,

    /// Extraction model name
    #[arg(long, default_value = "llama3")]
    model: String,

    /// User the session belongs to
    #[arg(long, env = "VISAGE_USER_ID")]
    user_id: String,

    /// Seconds to wait for a farewell before ending collection
    #[arg(long, default_value_t = 20)]
    collect_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client = reqwest::Client::new();
    let backend = Arc::new(VisageBackend::new(
        client.clone(),
        cli.backend_url,
        cli.backend_token,
    ));
    let collaborators = Collaborators {
        camera: Arc::new(HttpCamera::new(client.clone(), cli.camera_url)),
        speech: Arc::new(CoquiSpeech::new(
            client.clone(),
            cli.tts_url,
            cli.speaker_id,
            cli.language_id,
        )),
        extractor: Arc::new(OllamaExtractor::new(
            ollama_rs::Ollama::try_new(&cli.ollama_url)?,
            cli.model,
        )),
        store: backend.clone(),
        recognizer: backend,
    };

    let (tx, rx) = mpsc::channel(32);
    let session = Session::new(
        cli.user_id,
        collaborators,
        tx.clone(),
        Duration::from_secs(cli.collect_timeout_secs),
    );

    let listener = tokio::spawn(transcript::listen(cli.listen, tx));
    session.run(rx).await;
    listener.abort();
    Ok(())
}

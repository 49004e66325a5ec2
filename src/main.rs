use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voice_chat::config::RecognizerBackend;
use voice_chat::events::{self, Event, EventSender};
use voice_chat::prompt::load_system_prompt;
use voice_chat::remote::{HttpImageSource, ImageSource, PollinationsChat};
use voice_chat::voice::{
    CommandSynthesizer, ConsoleSynthesizer, Recognizer, SpeakOutcome, SpeechOutputGuard,
    StdinRecognizer, Synthesizer, select_voice,
};
use voice_chat::{
    Assistant, Config, ConversationTurnHandler, Error, ImageActionDispatcher, ImageModel,
    SessionState, SystemDesktop,
};

/// Voice Chat - talk to an AI assistant and get pictures back
#[derive(Parser)]
#[command(name = "voice-chat", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Transcript source: stdin or microphone
    #[arg(long)]
    recognizer: Option<RecognizerBackend>,

    /// Initial image model: flux, turbo or kontext
    #[arg(long)]
    image_model: Option<ImageModel>,

    /// System prompt file path or URL
    #[arg(long)]
    prompt: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show which local command a phrase triggers
    Classify {
        /// Phrase to classify
        text: String,
    },
    /// Speak text with the configured voice
    Say {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// List synthesizer voices
    Voices,
    /// Test microphone input
    #[cfg(feature = "microphone")]
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voice_chat=info",
        1 => "info,voice_chat=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Handle subcommands
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Classify { text } => {
                cmd_classify(&text);
                Ok(())
            }
            Command::Say { text } => cmd_say(&text).await,
            Command::Voices => cmd_voices(),
            #[cfg(feature = "microphone")]
            Command::TestMic { duration } => test_mic(duration).await,
        };
    }

    // Load configuration (flags > env > toml > default)
    let mut config = Config::load()?;
    if let Some(backend) = cli.recognizer {
        config.recognizer.backend = backend;
    }
    if let Some(model) = cli.image_model {
        config.image.default_model = model;
    }
    if let Some(prompt) = cli.prompt {
        config.prompt_source = prompt;
    }

    tracing::info!(
        recognizer = %config.recognizer.backend,
        image_model = %config.image.default_model,
        prompt = %config.prompt_source,
        "starting voice chat"
    );

    let (events, queue) = events::channel();
    let recognizer = build_recognizer(&config, events.clone())?;
    let synth = build_synthesizer(config.voice.program.as_deref(), events.clone());

    let system_prompt = load_system_prompt(&config.prompt_source).await;
    let session = SessionState::new(system_prompt).with_image_model(config.image.default_model);
    let speech = SpeechOutputGuard::new(synth, config.voice.hint.clone());

    let images: Arc<dyn ImageSource> = Arc::new(HttpImageSource::new());
    let chat = Arc::new(PollinationsChat::new(
        config.chat.url.clone(),
        config.chat.model.clone(),
    ));
    let turns = ConversationTurnHandler::new(
        chat,
        Arc::clone(&images),
        config.image.options.clone(),
        events,
    );

    let desktop = Arc::new(SystemDesktop::new(config.image.download_dir.clone()));
    let image_actions =
        ImageActionDispatcher::new(images, desktop).with_filename(config.image.filename.clone());

    let assistant = Assistant::new(session, speech, turns, image_actions, recognizer);

    if config.recognizer.backend == RecognizerBackend::Stdin {
        eprintln!("Type a message and press enter. Ctrl-D or Ctrl-C to quit.");
    }

    // Run until interrupted
    assistant.run(queue).await?;

    Ok(())
}

fn build_recognizer(config: &Config, events: EventSender) -> anyhow::Result<Box<dyn Recognizer>> {
    match config.recognizer.backend {
        RecognizerBackend::Stdin => Ok(Box::new(StdinRecognizer::stdin(events))),
        RecognizerBackend::Microphone => microphone_recognizer(config, events),
    }
}

#[cfg(feature = "microphone")]
fn microphone_recognizer(
    config: &Config,
    events: EventSender,
) -> anyhow::Result<Box<dyn Recognizer>> {
    use voice_chat::voice::{MicrophoneRecognizer, MicrophoneSettings};

    let api_key = config.recognizer.api_key.clone().ok_or_else(|| {
        Error::RecognitionUnsupported(
            "OPENAI_API_KEY required for microphone transcription".to_string(),
        )
    })?;

    let settings = MicrophoneSettings {
        stt_url: config.recognizer.stt_url.clone(),
        stt_model: config.recognizer.stt_model.clone(),
        api_key,
        language: config.recognizer.language.clone(),
    };
    Ok(Box::new(MicrophoneRecognizer::new(settings, events)))
}

#[cfg(not(feature = "microphone"))]
fn microphone_recognizer(
    _config: &Config,
    _events: EventSender,
) -> anyhow::Result<Box<dyn Recognizer>> {
    Err(Error::RecognitionUnsupported(
        "built without the `microphone` feature".to_string(),
    )
    .into())
}

fn build_synthesizer(program: Option<&str>, events: EventSender) -> Box<dyn Synthesizer> {
    match CommandSynthesizer::detect(program, events.clone()) {
        Some(synth) => {
            tracing::info!(kind = ?synth.kind(), "using system speech synthesizer");
            Box::new(synth)
        }
        None => {
            tracing::warn!("no speech synthesizer found, printing speech instead");
            Box::new(ConsoleSynthesizer::new(events))
        }
    }
}

/// Print the local action for a phrase
fn cmd_classify(text: &str) {
    match voice_chat::classify(text) {
        Some(action) => println!("{action}"),
        None => println!("none"),
    }
}

/// Speak text and wait for it to finish
async fn cmd_say(text: &str) -> anyhow::Result<()> {
    let config = Config::load()?;
    let (events, mut queue) = events::channel();
    let synth = build_synthesizer(config.voice.program.as_deref(), events.clone());
    let mut speech = SpeechOutputGuard::new(synth, config.voice.hint);

    let SpeakOutcome::Started(id) = speech.speak(text) else {
        anyhow::bail!("speech output did not start");
    };

    while let Some(event) = queue.next().await {
        if event == Event::SpeechEnded(id) {
            speech.finish(id);
            break;
        }
    }

    Ok(())
}

/// List voices, marking the one the hint selects
fn cmd_voices() -> anyhow::Result<()> {
    let config = Config::load()?;
    let (events, _queue) = events::channel();
    let synth = build_synthesizer(config.voice.program.as_deref(), events.clone());

    let voices = synth.voices();
    if voices.is_empty() {
        println!("No voices available");
        return Ok(());
    }

    let selected = select_voice(&voices, &config.voice.hint).map(|v| v.id.clone());
    for voice in &voices {
        let marker = if Some(&voice.id) == selected.as_ref() { "*" } else { " " };
        let gender = voice
            .gender
            .map_or_else(String::new, |g| format!(" ({g:?})"));
        println!("{marker} {:<24} {:<8}{gender}", voice.name, voice.lang);
    }

    if selected.is_none() {
        println!("\nNo voice matches the configured hint; the default voice will be used.");
    }

    Ok(())
}

/// Test microphone input
#[cfg(feature = "microphone")]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    use std::time::Duration;

    use voice_chat::voice::{AudioCapture, SAMPLE_RATE, rms_energy};

    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {SAMPLE_RATE} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = rms_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        // Clear buffer each second
        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check that an input device is connected and unmuted.");

    Ok(())
}

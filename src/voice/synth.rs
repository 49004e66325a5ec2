//! Text-to-speech backends
//!
//! Synthesizers start output and return immediately. Progress is reported
//! through `SpeechStarted` / `SpeechEnded` events on the assistant queue.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::task::JoinHandle;

use crate::events::{Event, EventSender, UtteranceId};
use crate::{Error, Result};

/// Programs probed, in order, when no TTS program is configured
const KNOWN_PROGRAMS: &[&str] = &["say", "espeak-ng", "espeak"];

/// Voice gender as reported by the TTS backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    /// Parse `female`/`male` or the single-letter `F`/`M` forms
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f" | "female" => Some(Self::Female),
            "m" | "male" => Some(Self::Male),
            _ => None,
        }
    }
}

/// A voice offered by a synthesizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Identifier passed back to the backend
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Language tag, e.g. `en-GB` or `en_GB`
    pub lang: String,
    pub gender: Option<Gender>,
}

/// Preferred voice characteristics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceHint {
    pub preferred_name: String,
    pub locale: String,
    pub gender: Option<Gender>,
}

impl Default for VoiceHint {
    fn default() -> Self {
        Self {
            preferred_name: "Google UK English Female".to_string(),
            locale: "en-GB".to_string(),
            gender: Some(Gender::Female),
        }
    }
}

/// Pick the first voice matching the hint
///
/// A voice matches when its name contains the preferred name, or when both
/// its language and its gender match. `None` means the backend default.
#[must_use]
pub fn select_voice<'a>(voices: &'a [Voice], hint: &VoiceHint) -> Option<&'a Voice> {
    let locale = normalize_lang(&hint.locale);
    voices.iter().find(|voice| {
        (!hint.preferred_name.is_empty() && voice.name.contains(&hint.preferred_name))
            || (normalize_lang(&voice.lang) == locale
                && hint.gender.is_some()
                && voice.gender == hint.gender)
    })
}

fn normalize_lang(lang: &str) -> String {
    lang.trim().replace('_', "-").to_ascii_lowercase()
}

/// Speech output backend
pub trait Synthesizer: Send {
    /// Voices the backend can use
    fn voices(&self) -> Vec<Voice>;

    /// Begin speaking `text`
    ///
    /// # Errors
    ///
    /// Returns error if output cannot be started
    fn speak(&mut self, id: UtteranceId, text: &str, voice: Option<&Voice>) -> Result<()>;

    /// Discard any in-flight output
    fn cancel(&mut self);
}

/// Command-line syntax family of a TTS program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsProgram {
    /// macOS `say`
    Say,
    /// `espeak-ng` / `espeak`
    Espeak,
}

impl TtsProgram {
    fn from_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if stem.starts_with("espeak") {
            Self::Espeak
        } else {
            Self::Say
        }
    }

    const fn list_voices_args(self) -> &'static [&'static str] {
        match self {
            Self::Say => &["-v", "?"],
            Self::Espeak => &["--voices"],
        }
    }

    fn parse_voices(self, listing: &str) -> Vec<Voice> {
        match self {
            Self::Say => parse_say_voices(listing),
            Self::Espeak => parse_espeak_voices(listing),
        }
    }
}

/// Speaks through an external TTS program
pub struct CommandSynthesizer {
    program: PathBuf,
    kind: TtsProgram,
    voices: Vec<Voice>,
    events: EventSender,
    task: Option<JoinHandle<()>>,
}

impl CommandSynthesizer {
    /// Use a specific program
    pub fn new(program: PathBuf, events: EventSender) -> Self {
        let kind = TtsProgram::from_path(&program);
        let voices = list_voices(&program, kind);
        tracing::debug!(
            program = %program.display(),
            voices = voices.len(),
            "tts program ready"
        );

        Self {
            program,
            kind,
            voices,
            events,
            task: None,
        }
    }

    /// Resolve the configured program, or probe the known ones on `PATH`
    #[must_use]
    pub fn detect(configured: Option<&str>, events: EventSender) -> Option<Self> {
        let program = match configured {
            Some(name) => match which::which(name) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(program = name, error = %e, "configured tts program not found");
                    return None;
                }
            },
            None => KNOWN_PROGRAMS
                .iter()
                .find_map(|name| which::which(name).ok())?,
        };

        Some(Self::new(program, events))
    }

    #[must_use]
    pub const fn kind(&self) -> TtsProgram {
        self.kind
    }
}

impl Synthesizer for CommandSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&mut self, id: UtteranceId, text: &str, voice: Option<&Voice>) -> Result<()> {
        self.cancel();

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(speak_args(text, voice))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            Error::Speech(format!(
                "failed to spawn {}: {e}",
                self.program.display()
            ))
        })?;

        let events = self.events.clone();
        events.emit(Event::SpeechStarted(id));
        self.task = Some(tokio::spawn(async move {
            match child.wait_with_output().await {
                Ok(output) if !output.status.success() => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    tracing::warn!(status = %output.status, stderr = %stderr, "tts program failed");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "tts program error"),
            }
            events.emit(Event::SpeechEnded(id));
        }));

        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            // Dropping the child inside the aborted task kills the process
            task.abort();
        }
    }
}

impl Drop for CommandSynthesizer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Arguments for one utterance
///
/// `--` ends option parsing, so replies such as "- First item" or
/// "-5 degrees" are spoken rather than read as flags.
fn speak_args<'a>(text: &'a str, voice: Option<&'a Voice>) -> Vec<&'a str> {
    let mut args = Vec::with_capacity(4);
    if let Some(voice) = voice {
        args.extend(["-v", voice.id.as_str()]);
    }
    args.extend(["--", text]);
    args
}

/// Fallback used when no TTS program is installed
///
/// The assistant already prints every reply, so utterances only go to the log.
pub struct ConsoleSynthesizer {
    events: EventSender,
}

impl ConsoleSynthesizer {
    #[must_use]
    pub const fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl Synthesizer for ConsoleSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(&mut self, id: UtteranceId, text: &str, _voice: Option<&Voice>) -> Result<()> {
        self.events.emit(Event::SpeechStarted(id));
        tracing::debug!(text, "speaking (console)");
        self.events.emit(Event::SpeechEnded(id));
        Ok(())
    }

    fn cancel(&mut self) {}
}

/// Ask the program for its voice list; an empty list means default voice only
fn list_voices(program: &Path, kind: TtsProgram) -> Vec<Voice> {
    match std::process::Command::new(program)
        .args(kind.list_voices_args())
        .stderr(Stdio::null())
        .output()
    {
        Ok(output) if output.status.success() => {
            kind.parse_voices(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            tracing::debug!(status = %output.status, "voice listing failed");
            Vec::new()
        }
        Err(e) => {
            tracing::debug!(error = %e, "voice listing failed");
            Vec::new()
        }
    }
}

/// Parse `say -v ?` output: `Name   en_GB    # sample sentence`
fn parse_say_voices(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .filter_map(|line| {
            let head = line.split('#').next()?.trim_end();
            let (name, lang) = head.rsplit_once(char::is_whitespace)?;
            let name = name.trim();
            if name.is_empty() || lang.is_empty() {
                return None;
            }
            Some(Voice {
                id: name.to_string(),
                name: name.to_string(),
                lang: lang.to_string(),
                gender: None,
            })
        })
        .collect()
}

/// Parse `espeak-ng --voices` output
///
/// Columns: `Pty Language Age/Gender VoiceName File Other Languages`
fn parse_espeak_voices(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let _priority = cols.next()?;
            let lang = cols.next()?;
            let age_gender = cols.next()?;
            let name = cols.next()?;
            let gender = age_gender
                .split_once('/')
                .and_then(|(_, g)| Gender::parse(g));
            Some(Voice {
                id: lang.to_string(),
                name: name.replace('_', " "),
                lang: lang.to_string(),
                gender,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(name: &str, lang: &str, gender: Option<Gender>) -> Voice {
        Voice {
            id: name.to_string(),
            name: name.to_string(),
            lang: lang.to_string(),
            gender,
        }
    }

    #[test]
    fn test_select_voice_by_name() {
        let voices = vec![
            voice("Daniel", "en-GB", Some(Gender::Male)),
            voice("Google UK English Female", "en-GB", None),
        ];
        let selected = select_voice(&voices, &VoiceHint::default()).unwrap();
        assert_eq!(selected.name, "Google UK English Female");
    }

    #[test]
    fn test_select_voice_by_locale_and_gender() {
        let voices = vec![
            voice("Samantha", "en_US", Some(Gender::Female)),
            voice("Daniel", "en_GB", Some(Gender::Male)),
            voice("Kate", "en_GB", Some(Gender::Female)),
        ];
        let selected = select_voice(&voices, &VoiceHint::default()).unwrap();
        assert_eq!(selected.name, "Kate");
    }

    #[test]
    fn test_select_voice_falls_back_to_default() {
        let voices = vec![
            voice("Daniel", "en_GB", None),
            voice("Samantha", "en_US", Some(Gender::Female)),
        ];
        assert!(select_voice(&voices, &VoiceHint::default()).is_none());
        assert!(select_voice(&[], &VoiceHint::default()).is_none());
    }

    #[test]
    fn test_parse_say_voices() {
        let listing = "\
Daniel              en_GB    # Hello! My name is Daniel.
Eddy (English (UK)) en_GB    # Hello! My name is Eddy.
Samantha            en_US    # Hello! My name is Samantha.
";
        let voices = parse_say_voices(listing);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[1].name, "Eddy (English (UK))");
        assert_eq!(voices[1].lang, "en_GB");
        assert_eq!(voices[2].id, "Samantha");
    }

    #[test]
    fn test_parse_espeak_voices() {
        let listing = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 2  en-gb           --/F      English_(Great_Britain) gmw/en            (en 2)
 5  en-us           --/M      English_(America)  gmw/en-US            (en 3)
";
        let voices = parse_espeak_voices(listing);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[1].id, "en-gb");
        assert_eq!(voices[1].name, "English (Great Britain)");
        assert_eq!(voices[1].gender, Some(Gender::Female));

        let selected = select_voice(&voices, &VoiceHint::default()).unwrap();
        assert_eq!(selected.id, "en-gb");
    }

    #[test]
    fn test_program_kind_from_path() {
        assert_eq!(
            TtsProgram::from_path(Path::new("/usr/bin/espeak-ng")),
            TtsProgram::Espeak
        );
        assert_eq!(TtsProgram::from_path(Path::new("/usr/bin/say")), TtsProgram::Say);
    }

    #[test]
    fn test_speak_args_end_options_before_text() {
        let en_gb = voice("en-gb", "en-gb", Some(Gender::Female));

        assert_eq!(
            speak_args("- First item", Some(&en_gb)),
            vec!["-v", "en-gb", "--", "- First item"]
        );
        assert_eq!(speak_args("-5 degrees", None), vec!["--", "-5 degrees"]);
    }

    #[tokio::test]
    async fn test_console_synthesizer_reports_lifecycle() {
        let (tx, mut queue) = crate::events::channel();
        let mut synth = ConsoleSynthesizer::new(tx);
        synth.speak(UtteranceId(1), "hello", None).unwrap();

        assert_eq!(queue.next().await, Some(Event::SpeechStarted(UtteranceId(1))));
        assert_eq!(queue.next().await, Some(Event::SpeechEnded(UtteranceId(1))));
    }
}

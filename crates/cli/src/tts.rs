//! Speech synthesis through a configurable command line.
//!
//! The command template is split on whitespace and each argument has its
//! placeholders substituted: `{text_file}` (a UTF-8 file holding the text),
//! `{output}` (the WAV file to write) and `{voice}`.

use slidecast_core::{Error, Result, SpeechSynthesizer};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::process;

/// Default synthesis command.
pub const DEFAULT_TTS_COMMAND: &str = "espeak-ng -v {voice} -w {output} -f {text_file}";

/// Voice used for segments without a mapped speaker.
pub const DEFAULT_VOICE: &str = "en";

const AUDIO_EXTENSION: &str = "wav";

/// Runs an external TTS program once per segment.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: PathBuf,
    args: Vec<String>,
    audio_dir: PathBuf,
    voices: HashMap<String, String>,
    default_voice: String,
}

impl CommandSynthesizer {
    /// Parse a command template writing into `audio_dir`.
    pub fn new(template: &str, audio_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::SynthesisError("empty TTS command".to_string()))?;
        let args: Vec<String> = parts.collect();

        if !args.iter().any(|a| a.contains("{output}")) {
            return Err(Error::SynthesisError(format!(
                "TTS command must contain {{output}}: {}",
                template
            )));
        }

        Ok(Self {
            program: process::find_program(&program),
            args,
            audio_dir: audio_dir.into(),
            voices: HashMap::new(),
            default_voice: DEFAULT_VOICE.to_string(),
        })
    }

    /// Map speaker names to voices.
    pub fn with_voices<I>(mut self, voices: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.voices.extend(voices);
        self
    }

    pub fn with_default_voice(mut self, voice: impl Into<String>) -> Self {
        self.default_voice = voice.into();
        self
    }

    /// Stable output path for a segment index.
    pub fn audio_path(&self, index: usize) -> PathBuf {
        self.audio_dir
            .join(format!("audio_{:04}.{}", index, AUDIO_EXTENSION))
    }

    /// Voice for a speaker, falling back to the default voice.
    pub fn voice_for(&self, speaker: Option<&str>) -> &str {
        speaker
            .and_then(|name| self.voices.get(name))
            .map_or(self.default_voice.as_str(), String::as_str)
    }

    fn command_args(&self, text_file: &Path, output: &Path, voice: &str) -> Vec<String> {
        let text_file = text_file.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{text_file}", &text_file)
                    .replace("{output}", &output)
                    .replace("{voice}", voice)
            })
            .collect()
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn synthesize(&self, text: &str, speaker: Option<&str>, index: usize) -> Result<PathBuf> {
        let output = self.audio_path(index);
        if fs::metadata(&output).is_ok_and(|m| m.len() > 0) {
            log::debug!("Reusing {}", output.display());
            return Ok(output);
        }

        let text_file = self.audio_dir.join(format!("text_{:04}.txt", index));
        fs::write(&text_file, text)?;

        let voice = self.voice_for(speaker);
        log::debug!("Synthesizing segment {} with voice {}", index, voice);
        let result = process::run(&self.program, self.command_args(&text_file, &output, voice), None);
        if let Err(e) = fs::remove_file(&text_file) {
            log::debug!("Could not remove {}: {}", text_file.display(), e);
        }
        result.map_err(|e| Error::SynthesisError(format!("segment {}: {}", index, e)))?;

        if !output.is_file() {
            return Err(Error::SynthesisError(format!(
                "segment {}: TTS command did not write {}",
                index,
                output.display()
            )));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_template_requires_output() {
        assert!(CommandSynthesizer::new("", "audio").is_err());
        assert!(CommandSynthesizer::new("say -f {text_file}", "audio").is_err());
        assert!(CommandSynthesizer::new(DEFAULT_TTS_COMMAND, "audio").is_ok());
    }

    #[test]
    fn test_placeholders_are_substituted() {
        let synth = CommandSynthesizer::new(DEFAULT_TTS_COMMAND, "audio").unwrap();
        let args = synth.command_args(Path::new("t.txt"), Path::new("o.wav"), "en-us");
        assert_eq!(args, vec!["-v", "en-us", "-w", "o.wav", "-f", "t.txt"]);
    }

    #[test]
    fn test_voice_mapping() {
        let synth = CommandSynthesizer::new(DEFAULT_TTS_COMMAND, "audio")
            .unwrap()
            .with_voices([("Sarah".to_string(), "en+f3".to_string())])
            .with_default_voice("en-gb");
        assert_eq!(synth.voice_for(Some("Sarah")), "en+f3");
        assert_eq!(synth.voice_for(Some("James")), "en-gb");
        assert_eq!(synth.voice_for(None), "en-gb");
    }

    #[test]
    fn test_audio_path_is_stable() {
        let synth = CommandSynthesizer::new(DEFAULT_TTS_COMMAND, "audio").unwrap();
        assert_eq!(synth.audio_path(7), PathBuf::from("audio/audio_0007.wav"));
    }

    #[test]
    fn test_existing_audio_is_reused() {
        let dir = tempdir().unwrap();
        let synth = CommandSynthesizer::new("slidecast-no-such-tts {output}", dir.path()).unwrap();
        fs::write(synth.audio_path(3), b"RIFF").unwrap();

        assert_eq!(synth.synthesize("Hello", None, 3).unwrap(), synth.audio_path(3));
        assert!(synth.synthesize("Hello", None, 4).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_command_with_text_file() {
        let dir = tempdir().unwrap();
        let synth = CommandSynthesizer::new("cp {text_file} {output}", dir.path()).unwrap();

        let path = synth.synthesize("Spoken words.", Some("Sarah"), 0).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "Spoken words.");
        assert!(!dir.path().join("text_0000.txt").exists());
    }
}

//! Video assembly with ffmpeg.
//!
//! Each frame becomes one clip: the still image looped for the length of its
//! concatenated audio. Clips are then joined with the concat demuxer.

use slidecast_core::pipeline::EMPTY_FRAME_HOLD;
use slidecast_core::{AudioClip, Error, Resolution, Result, VideoAssembler};
use std::fs;
use std::path::{Path, PathBuf};

use crate::process;

const FRAME_RATE: u32 = 24;
const AUDIO_BITRATE: &str = "320k";
const AUDIO_SAMPLE_RATE: u32 = 44_100;
const PRESET: &str = "slow";

/// Builds the output video with `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegAssembler {
    program: PathBuf,
    resolution: Resolution,
    clips_dir: PathBuf,
}

impl FfmpegAssembler {
    pub fn new(resolution: Resolution, clips_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: process::find_program("ffmpeg"),
            resolution,
            clips_dir: clips_dir.into(),
        }
    }

    /// Arguments rendering one frame and its audio into `clip`.
    fn clip_args(&self, frame: &Path, audio: &[AudioClip], clip: &Path) -> Vec<String> {
        let hold = [AudioClip::Silence(EMPTY_FRAME_HOLD)];
        let audio = if audio.is_empty() { &hold[..] } else { audio };
        let (width, height) = self.resolution.dimensions();

        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        args.extend([
            "-loop".to_string(),
            "1".to_string(),
            "-framerate".to_string(),
            FRAME_RATE.to_string(),
            "-i".to_string(),
            frame.to_string_lossy().to_string(),
        ]);

        for piece in audio {
            match piece {
                AudioClip::Speech(path) => {
                    args.push("-i".to_string());
                    args.push(path.to_string_lossy().to_string());
                }
                AudioClip::Silence(duration) => {
                    args.extend([
                        "-f".to_string(),
                        "lavfi".to_string(),
                        "-t".to_string(),
                        format!("{:.3}", duration.as_secs_f64()),
                        "-i".to_string(),
                        format!("anullsrc=r={}:cl=stereo", AUDIO_SAMPLE_RATE),
                    ]);
                }
            }
        }

        let mut filter = format!(
            "[0:v]scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,format=yuv420p[v];",
            w = width,
            h = height
        );
        for i in 0..audio.len() {
            filter.push_str(&format!(
                "[{}:a]aresample={},aformat=sample_fmts=fltp:channel_layouts=stereo[a{}];",
                i + 1,
                AUDIO_SAMPLE_RATE,
                i
            ));
        }
        for i in 0..audio.len() {
            filter.push_str(&format!("[a{}]", i));
        }
        filter.push_str(&format!("concat=n={}:v=0:a=1[a]", audio.len()));

        args.extend([
            "-filter_complex".to_string(),
            filter,
            "-map".to_string(),
            "[v]".to_string(),
            "-map".to_string(),
            "[a]".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            PRESET.to_string(),
            "-b:v".to_string(),
            self.resolution.video_bitrate().to_string(),
            "-r".to_string(),
            FRAME_RATE.to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            AUDIO_BITRATE.to_string(),
            "-shortest".to_string(),
            clip.to_string_lossy().to_string(),
        ]);

        args
    }

    fn concat_args(list: &Path, output: &Path) -> Vec<String> {
        [
            "-hide_banner",
            "-loglevel",
            "error",
            "-y",
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
            &*list.to_string_lossy(),
            "-c",
            "copy",
            &*output.to_string_lossy(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

impl VideoAssembler for FfmpegAssembler {
    fn assemble(&self, frames: &[PathBuf], audio: &[Vec<AudioClip>], output: &Path) -> Result<()> {
        if frames.is_empty() {
            return Err(Error::AssemblyError("no frames to assemble".to_string()));
        }
        if frames.len() != audio.len() {
            return Err(Error::AssemblyError(format!(
                "{} frames but {} audio lists",
                frames.len(),
                audio.len()
            )));
        }

        fs::create_dir_all(&self.clips_dir)?;
        let mut clips = Vec::with_capacity(frames.len());

        for (i, (frame, pieces)) in frames.iter().zip(audio).enumerate() {
            let clip = self.clips_dir.join(format!("clip_{:04}.mp4", i));
            log::debug!("Encoding clip {}/{}", i + 1, frames.len());
            process::run(&self.program, self.clip_args(frame, pieces, &clip), None)
                .map_err(|e| Error::AssemblyError(format!("frame {}: {}", i, e)))?;
            clips.push(clip);
        }

        let list = self.clips_dir.join("concat.txt");
        fs::write(&list, concat_list(&clips))?;

        log::info!(
            "Joining {} clips ({}, {})",
            clips.len(),
            self.resolution,
            self.resolution.video_bitrate()
        );
        process::run(&self.program, Self::concat_args(&list, output), None).map_err(Error::AssemblyError)?;

        Ok(())
    }
}

/// Concat demuxer list with single quotes escaped.
fn concat_list(clips: &[PathBuf]) -> String {
    clips
        .iter()
        .map(|clip| format!("file '{}'\n", clip.to_string_lossy().replace('\'', r"'\''")))
        .collect()
}

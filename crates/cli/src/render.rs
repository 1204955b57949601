//! Frame renderers backed by external tools.

use slidecast_core::{Error, FrameRenderer, Resolution, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::process;

/// Milliseconds Slidev may spend exporting one slide.
const SLIDEV_EXPORT_TIMEOUT_MS: &str = "120000";

/// Rasterizes a compiled Beamer PDF with `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    pdf: PathBuf,
    program: PathBuf,
}

impl PdfRenderer {
    pub fn new(pdf: PathBuf) -> Self {
        Self {
            pdf,
            program: process::find_program("pdftoppm"),
        }
    }

    fn args(&self, resolution: Resolution, out_dir: &Path) -> Vec<String> {
        let (width, height) = resolution.dimensions();
        vec![
            "-png".to_string(),
            "-scale-to-x".to_string(),
            width.to_string(),
            "-scale-to-y".to_string(),
            height.to_string(),
            self.pdf.to_string_lossy().to_string(),
            out_dir.join("frame").to_string_lossy().to_string(),
        ]
    }
}

impl FrameRenderer for PdfRenderer {
    fn render(&self, _source: &Path, resolution: Resolution, out_dir: &Path) -> Result<Vec<PathBuf>> {
        if !self.pdf.is_file() {
            return Err(Error::RenderError(format!(
                "{} not found; compile the LaTeX first",
                self.pdf.display()
            )));
        }

        log::info!("Rasterizing {}", self.pdf.display());
        process::run(&self.program, self.args(resolution, out_dir), None).map_err(Error::RenderError)?;
        collect_frames(out_dir)
    }
}

/// Exports a Slidev deck to PNG with `npx slidev export`.
#[derive(Debug, Clone)]
pub struct SlidevRenderer {
    program: PathBuf,
    with_clicks: bool,
}

impl SlidevRenderer {
    pub fn new() -> Self {
        Self {
            program: process::find_program("npx"),
            with_clicks: false,
        }
    }

    /// Export one image per click state.
    pub fn with_clicks(mut self, with_clicks: bool) -> Self {
        self.with_clicks = with_clicks;
        self
    }

    fn args(&self, source: &Path, out_dir: &Path) -> Vec<String> {
        let source = source.to_string_lossy();
        let out_dir = out_dir.to_string_lossy();
        let mut args: Vec<String> = [
            "slidev",
            "export",
            &*source,
            "--output",
            &*out_dir,
            "--format",
            "png",
            "--timeout",
            SLIDEV_EXPORT_TIMEOUT_MS,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if self.with_clicks {
            args.push("--with-clicks".to_string());
        }
        args
    }
}

impl Default for SlidevRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRenderer for SlidevRenderer {
    /// Slidev renders at the deck's own canvas size; frames are scaled to
    /// `resolution` during assembly.
    fn render(&self, source: &Path, _resolution: Resolution, out_dir: &Path) -> Result<Vec<PathBuf>> {
        log::info!(
            "Exporting {} with Slidev{}",
            source.display(),
            if self.with_clicks { " (with clicks)" } else { "" }
        );
        let cwd = source.parent().filter(|p| !p.as_os_str().is_empty());
        process::run(&self.program, self.args(source, out_dir), cwd).map_err(Error::RenderError)?;
        collect_frames(out_dir)
    }
}

/// PNG files in `dir`, sorted by name.
fn collect_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("png"))
        })
        .collect();
    frames.sort();
    log::debug!("Found {} frames in {}", frames.len(), dir.display());
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_pdf_is_fatal() {
        let dir = tempdir().unwrap();
        let renderer = PdfRenderer::new(dir.path().join("talk.pdf"));
        let err = renderer
            .render(&dir.path().join("talk.tex"), Resolution::Hd1080, dir.path())
            .unwrap_err();
        assert!(err.to_string().contains("compile the LaTeX first"));
    }

    #[test]
    fn test_pdftoppm_args() {
        let renderer = PdfRenderer::new(PathBuf::from("talk.pdf"));
        let args = renderer.args(Resolution::Hd720, Path::new("out"));
        assert_eq!(
            args,
            vec!["-png", "-scale-to-x", "1280", "-scale-to-y", "720", "talk.pdf", "out/frame"]
        );
    }

    #[test]
    fn test_slidev_args() {
        let renderer = SlidevRenderer::new();
        let args = renderer.args(Path::new("slides.md"), Path::new("out"));
        assert_eq!(
            args,
            vec!["slidev", "export", "slides.md", "--output", "out", "--format", "png", "--timeout", "120000"]
        );

        let args = renderer.with_clicks(true).args(Path::new("slides.md"), Path::new("out"));
        assert_eq!(args.last().map(String::as_str), Some("--with-clicks"));
    }

    #[test]
    fn test_collect_frames_sorted_png_only() {
        let dir = tempdir().unwrap();
        for name in ["frame-10.png", "frame-02.png", "notes.txt", "frame-01.PNG"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let frames = collect_frames(dir.path()).unwrap();
        let names: Vec<String> = frames
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        assert_eq!(names, vec!["frame-01.PNG", "frame-02.png", "frame-10.png"]);
    }
}

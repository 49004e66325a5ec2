//! Actions on the currently displayed image
//!
//! Copy, save and open all resolve the displayed image locator first and do
//! nothing when no image has been shown yet. Outcomes are reported by voice.
//! Decoding and file writes run on the blocking pool.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use url::Url;

use crate::remote::ImageSource;
use crate::voice::SpeechOutputGuard;
use crate::{Error, Result};

/// Filename suggested when saving
pub const DEFAULT_FILENAME: &str = "pollination_image.png";

const COPY_DONE: &str = "Image copied to clipboard.";
const COPY_FAILED: &str = "Sorry, I could not copy the image.";
const SAVE_DONE: &str = "Image saved.";
const SAVE_FAILED: &str = "Sorry, I could not save the image.";
const OPEN_DONE: &str = "Image opened.";
const OPEN_FAILED: &str = "Sorry, I could not open the image.";

/// Host desktop integration
pub trait Desktop: Send + Sync {
    /// Put encoded image bytes on the clipboard as image data
    ///
    /// # Errors
    ///
    /// Returns `ClipboardOrFile` if decoding or the clipboard write fails
    fn copy_image(&self, bytes: &[u8]) -> Result<()>;

    /// Write bytes to a new file, returning where it landed
    ///
    /// # Errors
    ///
    /// Returns `ClipboardOrFile` if the file cannot be written
    fn save_file(&self, name: &str, bytes: &[u8]) -> Result<PathBuf>;

    /// Open a URL in the default viewer
    ///
    /// # Errors
    ///
    /// Returns `ClipboardOrFile` if no viewer could be launched
    fn open_url(&self, url: &Url) -> Result<()>;
}

/// Result of an image action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageActionOutcome {
    /// No image displayed, nothing done
    NoImage,
    Done,
    Failed,
}

/// Performs copy/save/open against the displayed image
pub struct ImageActionDispatcher {
    source: Arc<dyn ImageSource>,
    desktop: Arc<dyn Desktop>,
    filename: String,
}

impl ImageActionDispatcher {
    pub fn new(source: Arc<dyn ImageSource>, desktop: Arc<dyn Desktop>) -> Self {
        Self {
            source,
            desktop,
            filename: DEFAULT_FILENAME.to_string(),
        }
    }

    /// Use a different default filename for saves
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Fetch the displayed image and place it on the clipboard
    pub async fn copy_to_clipboard(
        &self,
        displayed: Option<&Url>,
        speech: &mut SpeechOutputGuard,
    ) -> ImageActionOutcome {
        let Some(locator) = displayed else {
            return no_image("copy");
        };

        let result = match self.source.fetch(locator).await {
            Ok(bytes) => {
                let desktop = Arc::clone(&self.desktop);
                blocking(move || desktop.copy_image(&bytes)).await
            }
            Err(e) => Err(e),
        };

        report("copy", result, speech, COPY_DONE, COPY_FAILED)
    }

    /// Fetch the displayed image and write it to the download directory
    pub async fn save_to_disk(
        &self,
        displayed: Option<&Url>,
        suggested_name: Option<&str>,
        speech: &mut SpeechOutputGuard,
    ) -> ImageActionOutcome {
        let Some(locator) = displayed else {
            return no_image("save");
        };
        let name = suggested_name.unwrap_or(&self.filename).to_string();

        let result = match self.source.fetch(locator).await {
            Ok(bytes) => {
                let desktop = Arc::clone(&self.desktop);
                blocking(move || desktop.save_file(&name, &bytes))
                    .await
                    .map(|path| tracing::info!(path = %path.display(), "image saved"))
            }
            Err(e) => Err(e),
        };

        report("save", result, speech, SAVE_DONE, SAVE_FAILED)
    }

    /// Open the displayed image locator directly
    pub fn open_in_viewer(
        &self,
        displayed: Option<&Url>,
        speech: &mut SpeechOutputGuard,
    ) -> ImageActionOutcome {
        let Some(locator) = displayed else {
            return no_image("open");
        };

        let result = self.desktop.open_url(locator);
        report("open", result, speech, OPEN_DONE, OPEN_FAILED)
    }
}

async fn blocking<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| Error::ClipboardOrFile(format!("desktop task failed: {e}")))?
}

fn no_image(action: &str) -> ImageActionOutcome {
    tracing::debug!(action, "no image displayed");
    ImageActionOutcome::NoImage
}

fn report(
    action: &str,
    result: Result<()>,
    speech: &mut SpeechOutputGuard,
    done: &str,
    failed: &str,
) -> ImageActionOutcome {
    match result {
        Ok(()) => {
            speech.speak(done);
            ImageActionOutcome::Done
        }
        Err(e) => {
            tracing::warn!(action, error = %e, "image action failed");
            speech.speak(failed);
            ImageActionOutcome::Failed
        }
    }
}

/// Clipboard, download directory and viewer of the local machine
pub struct SystemDesktop {
    download_dir: PathBuf,
    // Kept alive so the clipboard owner keeps serving the image
    clipboard: Mutex<Option<arboard::Clipboard>>,
}

impl SystemDesktop {
    #[must_use]
    pub fn new(download_dir: PathBuf) -> Self {
        Self {
            download_dir,
            clipboard: Mutex::new(None),
        }
    }
}

impl Desktop for SystemDesktop {
    fn copy_image(&self, bytes: &[u8]) -> Result<()> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| Error::ClipboardOrFile(format!("unsupported image data: {e}")))?
            .to_rgba8();
        let (width, height) = decoded.dimensions();

        let mut guard = self
            .clipboard
            .lock()
            .map_err(|_| Error::ClipboardOrFile("clipboard lock poisoned".to_string()))?;
        if guard.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|e| Error::ClipboardOrFile(format!("clipboard unavailable: {e}")))?;
            *guard = Some(clipboard);
        }
        let clipboard = guard
            .as_mut()
            .ok_or_else(|| Error::ClipboardOrFile("clipboard unavailable".to_string()))?;

        clipboard
            .set_image(arboard::ImageData {
                width: width as usize,
                height: height as usize,
                bytes: Cow::Owned(decoded.into_raw()),
            })
            .map_err(|e| Error::ClipboardOrFile(format!("clipboard write failed: {e}")))
    }

    fn save_file(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.download_dir).map_err(|e| {
            Error::ClipboardOrFile(format!(
                "cannot create {}: {e}",
                self.download_dir.display()
            ))
        })?;

        let path = unique_path(&self.download_dir, name);
        std::fs::write(&path, bytes).map_err(|e| {
            Error::ClipboardOrFile(format!("cannot write {}: {e}", path.display()))
        })?;
        Ok(path)
    }

    fn open_url(&self, url: &Url) -> Result<()> {
        let mut cmd = viewer_command(url.as_str());
        cmd.stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        cmd.spawn()
            .map(drop)
            .map_err(|e| Error::ClipboardOrFile(format!("failed to launch viewer: {e}")))
    }
}

#[cfg(target_os = "macos")]
fn viewer_command(target: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("open");
    cmd.arg(target);
    cmd
}

#[cfg(target_os = "windows")]
fn viewer_command(target: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("cmd");
    cmd.args(["/C", "start", "", target]);
    cmd
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn viewer_command(target: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("xdg-open");
    cmd.arg(target);
    cmd
}

/// `dir/name`, or `dir/stem (n).ext` for the first n not already taken
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let file = Path::new(name);
    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    let extension = file.extension().and_then(|e| e.to_str());

    (1_u32..)
        .map(|n| match extension {
            Some(ext) => dir.join(format!("{stem} ({n}).{ext}")),
            None => dir.join(format!("{stem} ({n})")),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_path_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();

        let first = unique_path(dir.path(), DEFAULT_FILENAME);
        assert_eq!(first, dir.path().join("pollination_image.png"));
        std::fs::write(&first, b"a").unwrap();

        let second = unique_path(dir.path(), DEFAULT_FILENAME);
        assert_eq!(second, dir.path().join("pollination_image (1).png"));
        std::fs::write(&second, b"b").unwrap();

        let third = unique_path(dir.path(), DEFAULT_FILENAME);
        assert_eq!(third, dir.path().join("pollination_image (2).png"));
    }

    #[test]
    fn test_save_file_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let desktop = SystemDesktop::new(dir.path().join("downloads"));

        let path = desktop.save_file("picture.jpg", b"jpeg bytes").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg bytes");

        let again = desktop.save_file("picture.jpg", b"other").unwrap();
        assert_ne!(path, again);
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg bytes");
    }

    #[test]
    fn test_copy_rejects_non_image_bytes() {
        let desktop = SystemDesktop::new(PathBuf::from("."));
        assert!(matches!(
            desktop.copy_image(b"definitely not a png"),
            Err(Error::ClipboardOrFile(_))
        ));
    }
}

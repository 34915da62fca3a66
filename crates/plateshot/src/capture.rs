//! Frame capture.
//!
//! A [`FrameSource`] stands in for the camera: it produces the raw bytes of
//! one still image. [`CaptureSession`] owns a single source, acquires one
//! frame under a timeout, always releases the source, and normalises the
//! result to a JPEG ready for upload.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// A producer of still images.
///
/// Implementors hand back encoded image bytes (JPEG, PNG, ...). Sources are
/// moved onto a blocking thread for acquisition, hence `Send + 'static`.
pub trait FrameSource: Send + 'static {
    /// The name of this source (for logging and error messages).
    fn name(&self) -> &'static str;

    /// The image format the bytes are expected to be in, if known.
    fn format_hint(&self) -> Option<ImageFormat> {
        None
    }

    /// Produce the bytes of one still image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureUnavailable`] if the source cannot deliver.
    fn acquire(&mut self) -> Result<Vec<u8>>;

    /// The source's active flag.
    fn state(&self) -> &SourceState;

    /// Release whatever the source holds. Must be safe to call repeatedly.
    fn release(&mut self) {
        self.state().release();
    }

    /// Whether the source is currently held open.
    fn is_active(&self) -> bool {
        self.state().is_active()
    }
}

/// Whether a frame source is held open.
///
/// Clones share one flag, so a [`CaptureSession`] can release a source whose
/// `acquire` is still blocked on another thread.
#[derive(Debug, Clone, Default)]
pub struct SourceState(Arc<AtomicBool>);

impl SourceState {
    /// A released state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the source as held.
    pub fn activate(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Mark the source as released.
    pub fn release(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Whether the source is held.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Reads a frame from an image file.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    state: SourceState,
}

impl FileSource {
    /// Source backed by the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: SourceState::new(),
        }
    }

    /// The file this source reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    fn format_hint(&self) -> Option<ImageFormat> {
        ImageFormat::from_path(&self.path).ok()
    }

    fn acquire(&mut self) -> Result<Vec<u8>> {
        std::fs::read(&self.path).map_err(|e| {
            Error::capture_unavailable(self.name(), format!("{}: {e}", self.path.display()))
        })
    }

    fn state(&self) -> &SourceState {
        &self.state
    }
}

/// Reads a frame piped on standard input.
#[derive(Debug, Default)]
pub struct StdinSource {
    state: SourceState,
}

impl StdinSource {
    /// Source backed by this process's stdin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSource for StdinSource {
    fn name(&self) -> &'static str {
        "stdin"
    }

    fn acquire(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        std::io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .map_err(|e| Error::capture_unavailable(self.name(), e.to_string()))?;
        if bytes.is_empty() {
            return Err(Error::capture_unavailable(self.name(), "no data on stdin"));
        }
        Ok(bytes)
    }

    fn state(&self) -> &SourceState {
        &self.state
    }
}

/// A frame already in memory.
#[derive(Debug)]
pub struct BytesSource {
    bytes: Option<Vec<u8>>,
    hint: Option<ImageFormat>,
    state: SourceState,
}

impl BytesSource {
    /// Source that yields `bytes` once.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Some(bytes),
            hint: None,
            state: SourceState::new(),
        }
    }

    /// Declare the expected format of the bytes.
    #[must_use]
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.hint = Some(format);
        self
    }
}

impl FrameSource for BytesSource {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn format_hint(&self) -> Option<ImageFormat> {
        self.hint
    }

    fn acquire(&mut self) -> Result<Vec<u8>> {
        self.bytes
            .take()
            .ok_or_else(|| Error::capture_unavailable(self.name(), "frame already taken"))
    }

    fn state(&self) -> &SourceState {
        &self.state
    }
}

/// Tuning for frame acquisition and encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Give up on the source after this long.
    pub acquire_timeout: Duration,
    /// Longest edge in pixels; 0 keeps the original size.
    pub max_dimension: u32,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for CaptureOptions {
    fn from(config: &Config) -> Self {
        Self {
            acquire_timeout: config.acquire_timeout(),
            max_dimension: config.capture.max_dimension,
            jpeg_quality: config.capture.jpeg_quality,
        }
    }
}

/// A captured still, encoded as JPEG.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// JPEG bytes.
    pub jpeg: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Name of the source it came from.
    pub source: &'static str,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("jpeg_len", &self.jpeg.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("source", &self.source)
            .finish()
    }
}

impl Frame {
    /// BLAKE3 hash of the JPEG bytes, hex encoded.
    #[must_use]
    pub fn content_hash(&self) -> String {
        blake3::hash(&self.jpeg).to_hex().to_string()
    }

    /// Write the JPEG into `dir` as `<hash>.jpg` and return its path.
    ///
    /// Identical frames map to the same file, which is written only once.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn archive(&self, dir: &Path) -> Result<PathBuf> {
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let path = dir.join(format!("{}.jpg", self.content_hash()));
        if path.exists() {
            debug!("Image already archived at {}", path.display());
        } else {
            std::fs::write(&path, &self.jpeg)?;
            info!("Archived image to {}", path.display());
        }
        Ok(path)
    }
}

/// One capture from one source.
///
/// The session owns its source, so only one source can be open at a time.
/// The source is active while acquisition runs and released whether it
/// succeeds, fails or times out. On timeout a read already blocked in the OS
/// is abandoned rather than interrupted.
pub struct CaptureSession {
    source: Box<dyn FrameSource>,
    options: CaptureOptions,
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("source", &self.source.name())
            .field("options", &self.options)
            .finish()
    }
}

impl CaptureSession {
    /// Create a session over `source`.
    #[must_use]
    pub fn new(source: Box<dyn FrameSource>, options: CaptureOptions) -> Self {
        Self { source, options }
    }

    /// Acquire one frame and encode it as JPEG.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureTimeout`] if the source does not deliver in
    /// time, [`Error::CaptureUnavailable`] if it fails, or an image error if
    /// the bytes cannot be decoded.
    pub async fn capture(self) -> Result<Frame> {
        let Self {
            mut source,
            options,
        } = self;
        let name = source.name();
        let hint = source.format_hint();
        let state = source.state().clone();
        debug!("Acquiring frame from {}", name);

        state.activate();
        let acquisition = tokio::task::spawn_blocking(move || {
            let bytes = source.acquire();
            source.release();
            bytes
        });
        let outcome = tokio::time::timeout(options.acquire_timeout, acquisition).await;
        state.release();

        let bytes = match outcome {
            Ok(Ok(bytes)) => bytes?,
            Ok(Err(join_err)) => {
                return Err(Error::capture_unavailable(name, join_err.to_string()));
            }
            Err(_) => {
                warn!("Frame source {} timed out", name);
                #[allow(clippy::cast_possible_truncation)]
                let timeout_ms = options.acquire_timeout.as_millis() as u64;
                return Err(Error::CaptureTimeout {
                    source_name: name,
                    timeout_ms,
                });
            }
        };

        let frame = encode_frame(&bytes, hint, &options, name)?;
        info!(
            "Captured {}x{} frame from {} ({} bytes)",
            frame.width,
            frame.height,
            name,
            frame.jpeg.len()
        );
        Ok(frame)
    }
}

/// Decode `bytes`, trusting `hint` first and falling back to sniffing.
fn decode(bytes: &[u8], hint: Option<ImageFormat>) -> Result<DynamicImage> {
    if let Some(format) = hint {
        match image::load_from_memory_with_format(bytes, format) {
            Ok(img) => return Ok(img),
            Err(e) => warn!(
                "Decoding as {:?} failed ({}), retrying with format detection",
                format, e
            ),
        }
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Shrink `img` to fit a `max` x `max` box, preserving aspect ratio.
fn fit(img: DynamicImage, max: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if max == 0 || (width <= max && height <= max) {
        return img;
    }
    debug!("Downscaling {}x{} to fit {}", width, height, max);
    img.resize(max, max, FilterType::Triangle)
}

fn encode_frame(
    bytes: &[u8],
    hint: Option<ImageFormat>,
    options: &CaptureOptions,
    source: &'static str,
) -> Result<Frame> {
    let img = fit(decode(bytes, hint)?, options.max_dimension);
    let (width, height) = img.dimensions();

    let mut jpeg = Vec::new();
    let rgb = img.to_rgb8();
    JpegEncoder::new_with_quality(&mut jpeg, options.jpeg_quality).encode_image(&rgb)?;

    Ok(Frame {
        jpeg,
        width,
        height,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::AtomicUsize;

    /// PNG bytes of a solid `width` x `height` image.
    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 180, 20]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    /// What a [`RecordingSource`] does when asked for a frame.
    #[derive(Clone, Copy)]
    enum Behaviour {
        Deliver,
        Fail,
        Stall,
    }

    /// A source that counts its releases and notes whether it was held
    /// while acquiring.
    struct RecordingSource {
        behaviour: Behaviour,
        state: SourceState,
        releases: Arc<AtomicUsize>,
        held_during_acquire: Arc<AtomicBool>,
    }

    impl RecordingSource {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                state: SourceState::new(),
                releases: Arc::new(AtomicUsize::new(0)),
                held_during_acquire: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl FrameSource for RecordingSource {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn acquire(&mut self) -> Result<Vec<u8>> {
            self.held_during_acquire
                .store(self.state.is_active(), Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Deliver => Ok(png_bytes(4, 4)),
                Behaviour::Fail => Err(Error::capture_unavailable("recording", "no frame")),
                Behaviour::Stall => {
                    std::thread::sleep(Duration::from_millis(500));
                    Ok(png_bytes(4, 4))
                }
            }
        }

        fn state(&self) -> &SourceState {
            &self.state
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
            self.state.release();
        }
    }

    /// Capture from a [`RecordingSource`] and return the outcome, the
    /// source's state, its release count and whether it was held while
    /// acquiring.
    async fn capture_recorded(
        behaviour: Behaviour,
        opts: CaptureOptions,
    ) -> (Result<Frame>, SourceState, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let source = RecordingSource::new(behaviour);
        let state = source.state.clone();
        let releases = Arc::clone(&source.releases);
        let held = Arc::clone(&source.held_during_acquire);
        let outcome = CaptureSession::new(Box::new(source), opts).capture().await;
        (outcome, state, releases, held)
    }

    fn options() -> CaptureOptions {
        CaptureOptions::default()
    }

    #[tokio::test]
    async fn test_capture_png_produces_jpeg() {
        let session = CaptureSession::new(Box::new(BytesSource::new(png_bytes(40, 20))), options());
        let frame = session.capture().await.unwrap();

        assert_eq!((frame.width, frame.height), (40, 20));
        assert_eq!(frame.source, "memory");
        // JPEG SOI marker
        assert_eq!(&frame.jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(
            image::guess_format(&frame.jpeg).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[tokio::test]
    async fn test_capture_downscales_to_max_dimension() {
        let opts = CaptureOptions {
            max_dimension: 50,
            ..options()
        };
        let session = CaptureSession::new(Box::new(BytesSource::new(png_bytes(200, 100))), opts);
        let frame = session.capture().await.unwrap();

        assert_eq!((frame.width, frame.height), (50, 25));
    }

    #[tokio::test]
    async fn test_capture_zero_max_dimension_keeps_size() {
        let opts = CaptureOptions {
            max_dimension: 0,
            ..options()
        };
        let session = CaptureSession::new(Box::new(BytesSource::new(png_bytes(300, 10))), opts);
        let frame = session.capture().await.unwrap();

        assert_eq!((frame.width, frame.height), (300, 10));
    }

    #[tokio::test]
    async fn test_wrong_hint_falls_back_to_detection() {
        let source = BytesSource::new(png_bytes(8, 8)).with_format(ImageFormat::Jpeg);
        let frame = CaptureSession::new(Box::new(source), options())
            .capture()
            .await
            .unwrap();

        assert_eq!((frame.width, frame.height), (8, 8));
    }

    #[tokio::test]
    async fn test_undecodable_bytes() {
        let source = BytesSource::new(b"definitely not an image".to_vec());
        let err = CaptureSession::new(Box::new(source), options())
            .capture()
            .await
            .unwrap_err();

        assert!(err.is_capture_error());
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let source = FileSource::new("/nonexistent/plate.jpg");
        let err = CaptureSession::new(Box::new(source), options())
            .capture()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::CaptureUnavailable {
                source_name: "file",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_file_source_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plate.png");
        std::fs::write(&path, png_bytes(16, 12)).unwrap();

        let frame = CaptureSession::new(Box::new(FileSource::new(&path)), options())
            .capture()
            .await
            .unwrap();
        assert_eq!((frame.width, frame.height), (16, 12));
        assert_eq!(frame.source, "file");
    }

    #[tokio::test]
    async fn test_acquire_timeout() {
        let opts = CaptureOptions {
            acquire_timeout: Duration::from_millis(20),
            ..options()
        };
        let (outcome, ..) = capture_recorded(Behaviour::Stall, opts).await;

        assert!(matches!(
            outcome.unwrap_err(),
            Error::CaptureTimeout {
                source_name: "recording",
                timeout_ms: 20
            }
        ));
    }

    #[tokio::test]
    async fn test_source_released_after_success() {
        let (outcome, state, releases, held) =
            capture_recorded(Behaviour::Deliver, options()).await;

        assert!(outcome.is_ok());
        assert!(held.load(Ordering::SeqCst));
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(!state.is_active());
    }

    #[tokio::test]
    async fn test_source_released_after_failure() {
        let (outcome, state, releases, held) = capture_recorded(Behaviour::Fail, options()).await;

        assert!(matches!(
            outcome.unwrap_err(),
            Error::CaptureUnavailable {
                source_name: "recording",
                ..
            }
        ));
        assert!(held.load(Ordering::SeqCst));
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(!state.is_active());
    }

    #[tokio::test]
    async fn test_source_released_after_timeout() {
        let opts = CaptureOptions {
            acquire_timeout: Duration::from_millis(20),
            ..options()
        };
        let (outcome, state, ..) = capture_recorded(Behaviour::Stall, opts).await;

        assert!(matches!(outcome.unwrap_err(), Error::CaptureTimeout { .. }));
        // Released as soon as the timeout fires, while acquire still sleeps.
        assert!(!state.is_active());
    }

    #[test]
    fn test_source_state_shared_between_clones() {
        let state = SourceState::new();
        let handle = state.clone();
        assert!(!state.is_active());

        state.activate();
        assert!(handle.is_active());
        handle.release();
        handle.release();
        assert!(!state.is_active());
    }

    #[test]
    fn test_file_source_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.png");
        std::fs::write(&path, png_bytes(2, 2)).unwrap();

        let mut source = FileSource::new(&path);
        assert!(!source.is_active());
        assert_eq!(source.format_hint(), Some(ImageFormat::Png));

        source.state().activate();
        source.acquire().unwrap();
        assert!(source.is_active());
        source.release();
        source.release();
        assert!(!source.is_active());
    }

    #[test]
    fn test_bytes_source_yields_once() {
        let mut source = BytesSource::new(vec![1, 2, 3]);
        assert_eq!(source.acquire().unwrap(), vec![1, 2, 3]);
        assert!(source.acquire().is_err());
    }

    #[test]
    fn test_frame_archive_is_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame {
            jpeg: vec![0xFF, 0xD8, 0x01],
            width: 1,
            height: 1,
            source: "memory",
        };

        let first = frame.archive(&dir.path().join("images")).unwrap();
        let second = frame.archive(&dir.path().join("images")).unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), frame.jpeg);
        assert!(first
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(&frame.content_hash()));
    }

    #[test]
    fn test_frame_debug_omits_bytes() {
        let frame = Frame {
            jpeg: vec![0; 4096],
            width: 1,
            height: 1,
            source: "memory",
        };
        let debug = format!("{frame:?}");
        assert!(debug.contains("jpeg_len: 4096"));
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.capture.jpeg_quality = 60;
        let opts = CaptureOptions::from(&config);

        assert_eq!(opts.jpeg_quality, 60);
        assert_eq!(opts.acquire_timeout, Duration::from_secs(10));
    }
}

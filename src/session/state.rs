use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};

use crate::assets::decode::PendingLogo;
use crate::export::blob::{BlobStore, ExportHandle};
use crate::export::png::{EncodedImage, ExportFormat, export};
use crate::foundation::core::Rgb;
use crate::foundation::error::{QrLogoError, QrLogoResult};
use crate::qr::encoder::{EcLevel, MatrixEncoder, QrcodeEncoder};
use crate::render::{logo, raster};
use crate::session::request::{GenerationRequest, SessionOpts, read_logo_file};

/// Where a session is in the generation lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// No generation in flight.
    Idle,
    /// Pipeline running.
    Generating,
    /// Last generation published a new handle.
    Ready,
    /// Last generation failed; any earlier handle is untouched.
    Failed,
}

/// Pipeline stage, used to attribute failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    /// Text to module matrix.
    Encode,
    /// Module matrix to pixels.
    Rasterize,
    /// Logo decode and overlay.
    Composite,
    /// Pixels to PNG.
    Export,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Encode => "matrix encoding",
            Self::Rasterize => "rasterization",
            Self::Composite => "logo compositing",
            Self::Export => "export",
        })
    }
}

struct StageFailure {
    stage: PipelineStage,
    error: QrLogoError,
}

fn at(stage: PipelineStage) -> impl FnOnce(QrLogoError) -> StageFailure {
    move |error| StageFailure { stage, error }
}

/// Holds `Generating` (and the shared in-progress flag) until dropped, however the pipeline
/// exits.
struct PhaseGuard<'a> {
    phase: &'a mut SessionPhase,
    generating: &'a AtomicBool,
}

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a mut SessionPhase, generating: &'a AtomicBool) -> Self {
        *phase = SessionPhase::Generating;
        generating.store(true, Ordering::Release);
        Self { phase, generating }
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *self.phase = SessionPhase::Idle;
        self.generating.store(false, Ordering::Release);
    }
}

/// One user's editing session: current parameters, the live export handle, and error state.
///
/// `generate` takes `&mut self`, so a session can never run two generations at once. Use
/// [`SharedSession`] when triggers come from several threads.
pub struct Session {
    opts: SessionOpts,
    request: GenerationRequest,
    encoder: Box<dyn MatrixEncoder>,
    store: Arc<BlobStore>,
    current: Option<ExportHandle>,
    phase: SessionPhase,
    generating: Arc<AtomicBool>,
    last_outcome: Option<SessionPhase>,
    error: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("request", &self.request)
            .field("current", &self.current)
            .field("phase", &self.phase)
            .field("error", &self.error)
            .finish()
    }
}

impl Session {
    /// Session backed by the `qrcode` encoder and a private blob store.
    pub fn new(opts: SessionOpts) -> QrLogoResult<Self> {
        Self::with_parts(opts, Box::new(QrcodeEncoder), BlobStore::new())
    }

    /// Session with an explicit encoder and blob store.
    pub fn with_parts(
        opts: SessionOpts,
        encoder: Box<dyn MatrixEncoder>,
        store: Arc<BlobStore>,
    ) -> QrLogoResult<Self> {
        opts.validate()?;
        let mut request = GenerationRequest::default();
        request.size = opts.clamp_size(request.size);
        Ok(Self {
            opts,
            request,
            encoder,
            store,
            current: None,
            phase: SessionPhase::Idle,
            generating: Arc::new(AtomicBool::new(false)),
            last_outcome: None,
            error: None,
        })
    }

    /// Current parameters.
    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    /// Session options.
    pub fn opts(&self) -> &SessionOpts {
        &self.opts
    }

    /// Blob store holding exported images.
    pub fn store(&self) -> &Arc<BlobStore> {
        &self.store
    }

    /// Replace every parameter at once. Size is validated at generation, not clamped.
    pub fn set_request(&mut self, request: GenerationRequest) {
        self.request = request;
    }

    /// Set the text to encode.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.request.text = text.into();
    }

    /// Set the output size, clamped into the configured bounds.
    pub fn set_size(&mut self, size: u32) {
        self.request.size = self.opts.clamp_size(size);
    }

    /// Set the dark module color.
    pub fn set_dark_color(&mut self, color: Rgb) {
        self.request.dark_color = color;
    }

    /// Set the light module / background color.
    pub fn set_light_color(&mut self, color: Rgb) {
        self.request.light_color = color;
    }

    /// Set the error-correction level.
    pub fn set_ec_level(&mut self, level: EcLevel) {
        self.request.ec_level = level;
    }

    /// Set or clear the logo bytes.
    pub fn set_logo(&mut self, logo: Option<Vec<u8>>) {
        self.request.logo = logo.map(Arc::new);
    }

    /// Read the logo from a file.
    pub fn set_logo_path(&mut self, path: impl AsRef<Path>) -> QrLogoResult<()> {
        let bytes = read_logo_file(path.as_ref())?;
        self.request.logo = Some(Arc::new(bytes));
        Ok(())
    }

    /// Current phase. Always `Idle` outside of `generate`.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether a generation is running. Other threads observe this through
    /// [`SharedSession::is_generating`].
    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::Acquire)
    }

    /// `Ready` or `Failed` for the last completed generation.
    pub fn last_outcome(&self) -> Option<SessionPhase> {
        self.last_outcome
    }

    /// User-visible error message of the last rejected or failed generation.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Handle of the last successful generation.
    pub fn current_handle(&self) -> Option<&ExportHandle> {
        self.current.as_ref()
    }

    /// Drop the current handle, revoking its blob.
    pub fn release(&mut self) {
        self.current = None;
    }

    /// Run encode → rasterize → composite → export for the current parameters.
    ///
    /// On success the previous handle is revoked and replaced. On failure the previous handle
    /// stays live and [`Session::error`] names the failing stage.
    #[tracing::instrument(skip(self), fields(size = self.request.size))]
    pub fn generate(&mut self) -> QrLogoResult<&ExportHandle> {
        if let Err(e) = self.request.validate(&self.opts) {
            tracing::warn!(error = %e, "generation rejected");
            self.error = Some(e.to_string());
            return Err(e);
        }

        let outcome = {
            let _phase = PhaseGuard::enter(&mut self.phase, &self.generating);
            run_pipeline(&self.request, &self.opts, self.encoder.as_ref())
        };

        match outcome {
            Ok(encoded) => {
                // At most one live handle per session.
                self.current = None;
                self.current = Some(self.store.publish(encoded));
                self.error = None;
                self.last_outcome = Some(SessionPhase::Ready);
                let handle = self
                    .current
                    .as_ref()
                    .ok_or_else(|| QrLogoError::encoding("handle missing after publish"))?;
                tracing::info!(url = %handle.url(), "generation ready");
                Ok(handle)
            }
            Err(StageFailure { stage, error }) => {
                tracing::warn!(%stage, error = %error, "generation failed");
                self.error = Some(format!("{stage} failed: {error}"));
                self.last_outcome = Some(SessionPhase::Failed);
                Err(error)
            }
        }
    }

    /// Write the current image into `dir` as `qr-<w>x<h>-<epochMillis>.png`.
    ///
    /// Returns `None` when nothing has been generated yet.
    pub fn download_to(&self, dir: impl AsRef<Path>) -> QrLogoResult<Option<PathBuf>> {
        let Some(handle) = self.current.as_ref() else {
            return Ok(None);
        };
        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        handle.save_to(dir.as_ref(), now_ms).map(Some)
    }
}

fn run_pipeline(
    req: &GenerationRequest,
    opts: &SessionOpts,
    encoder: &dyn MatrixEncoder,
) -> Result<EncodedImage, StageFailure> {
    std::thread::scope(|scope| {
        // Decode overlaps encode + rasterize; the compositor joins it.
        let pending = req
            .logo
            .as_ref()
            .map(|bytes| PendingLogo::spawn(scope, bytes.as_slice()));
        compose(req, opts, encoder, pending)
    })
}

/// Runs the stages after the logo decode has been started. `pending` is joined on every path.
fn compose(
    req: &GenerationRequest,
    opts: &SessionOpts,
    encoder: &dyn MatrixEncoder,
    pending: Option<PendingLogo<'_>>,
) -> Result<EncodedImage, StageFailure> {
    let rasterized = encoder
        .encode(&req.text, req.ec_level)
        .map_err(at(PipelineStage::Encode))
        .and_then(|matrix| {
            let margin = opts.margin.margin_for_size(req.size);
            raster::render(&matrix, req.size, margin, req.dark_color, req.light_color)
                .map_err(at(PipelineStage::Rasterize))
        });
    let decoded = pending.map(PendingLogo::wait);
    let mut surface = rasterized?;

    if let Some(decoded) = decoded {
        let decoded = decoded.map_err(at(PipelineStage::Composite))?;
        logo::overlay(&mut surface, decoded, req.light_color, opts.logo_fraction)
            .map_err(at(PipelineStage::Composite))?;
    }

    export(&surface, ExportFormat::Png, opts.export_quality).map_err(at(PipelineStage::Export))
}

/// Thread-safe wrapper that rejects a trigger while another generation holds the session.
#[derive(Clone, Debug)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
    generating: Arc<AtomicBool>,
}

impl SharedSession {
    /// Wrap a session.
    pub fn new(session: Session) -> Self {
        let generating = Arc::clone(&session.generating);
        Self {
            inner: Arc::new(Mutex::new(session)),
            generating,
        }
    }

    /// Whether a generation is running. Never waits on the session lock.
    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::Acquire)
    }

    /// Generate unless another generation is in flight, returning the new handle's URL.
    pub fn try_generate(&self) -> QrLogoResult<String> {
        let mut session = match self.inner.try_lock() {
            Ok(s) => s,
            Err(TryLockError::WouldBlock) => return Err(QrLogoError::Busy),
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
        };
        session.generate().map(ExportHandle::url)
    }

    /// Run `f` with exclusive access, waiting for any in-flight generation.
    pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut session)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/state.rs"]
mod tests;

use std::sync::Barrier;

use super::*;
use crate::assets::decode::DecodedLogo;
use crate::qr::encoder::ModuleMatrix;

fn png_logo(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([0, 0, 0, 255]));
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// 21x21 matrix with every module dark.
struct SolidEncoder;

impl MatrixEncoder for SolidEncoder {
    fn encode(&self, _text: &str, _ec_level: EcLevel) -> QrLogoResult<ModuleMatrix> {
        ModuleMatrix::from_modules(21, vec![true; 21 * 21])
    }
}

struct FailingEncoder;

impl MatrixEncoder for FailingEncoder {
    fn encode(&self, _text: &str, _ec_level: EcLevel) -> QrLogoResult<ModuleMatrix> {
        Err(QrLogoError::encoding_capacity("too long"))
    }
}

fn session_with(encoder: Box<dyn MatrixEncoder>) -> Session {
    Session::with_parts(SessionOpts::default(), encoder, BlobStore::new()).unwrap()
}

#[test]
fn new_session_is_idle_with_default_request() {
    let s = Session::new(SessionOpts::default()).unwrap();
    assert_eq!(s.phase(), SessionPhase::Idle);
    assert!(!s.is_generating());
    assert!(s.last_outcome().is_none());
    assert!(s.error().is_none());
    assert!(s.current_handle().is_none());
    assert_eq!(s.request().size, 450);
}

#[test]
fn new_session_rejects_inconsistent_opts() {
    let opts = SessionOpts {
        min_size: 0,
        ..SessionOpts::default()
    };
    assert!(Session::new(opts).is_err());
}

#[test]
fn set_size_clamps_into_bounds() {
    let mut s = Session::new(SessionOpts::default()).unwrap();
    s.set_size(1);
    assert_eq!(s.request().size, 128);
    s.set_size(1_000_000);
    assert_eq!(s.request().size, 4096);
}

#[test]
fn stage_names_are_human_readable() {
    assert_eq!(PipelineStage::Encode.to_string(), "matrix encoding");
    assert_eq!(PipelineStage::Rasterize.to_string(), "rasterization");
    assert_eq!(PipelineStage::Composite.to_string(), "logo compositing");
    assert_eq!(PipelineStage::Export.to_string(), "export");
}

#[test]
fn empty_text_is_rejected_before_the_pipeline() {
    let mut s = session_with(Box::new(SolidEncoder));
    let err = s.generate().unwrap_err();
    assert!(matches!(err, QrLogoError::Validation(_)));
    assert!(s.error().unwrap().contains("text must not be empty"));
    assert!(s.last_outcome().is_none());
    assert_eq!(s.store().live_count(), 0);
}

#[test]
fn successful_generation_publishes_one_handle() {
    let mut s = session_with(Box::new(SolidEncoder));
    s.set_text("hello");
    s.set_size(200);

    let url = s.generate().unwrap().url();
    assert_eq!(s.phase(), SessionPhase::Idle);
    assert_eq!(s.last_outcome(), Some(SessionPhase::Ready));
    assert!(s.error().is_none());
    assert_eq!(s.current_handle().unwrap().dimensions(), (200, 200));
    assert!(s.store().resolve(&url).is_some());
    assert_eq!(s.store().live_count(), 1);
}

#[test]
fn regeneration_revokes_the_previous_handle() {
    let mut s = session_with(Box::new(SolidEncoder));
    s.set_text("hello");
    let first = s.generate().unwrap().url();
    let second = s.generate().unwrap().url();
    assert_ne!(first, second);
    assert!(s.store().resolve(&first).is_none());
    assert!(s.store().resolve(&second).is_some());
    assert_eq!(s.store().live_count(), 1);
}

#[test]
fn encoder_failure_keeps_the_previous_handle() {
    let store = BlobStore::new();
    let mut ok = Session::with_parts(
        SessionOpts::default(),
        Box::new(SolidEncoder),
        Arc::clone(&store),
    )
    .unwrap();
    ok.set_text("hello");
    ok.generate().unwrap();

    // Swap encoders by rebuilding around the same handle.
    let mut s = Session {
        encoder: Box::new(FailingEncoder),
        ..ok
    };
    let before = s.current_handle().unwrap().url();

    let err = s.generate().unwrap_err();
    assert!(matches!(err, QrLogoError::EncodingCapacity(_)));
    assert_eq!(s.last_outcome(), Some(SessionPhase::Failed));
    assert!(s.error().unwrap().starts_with("matrix encoding failed:"));
    assert_eq!(s.current_handle().unwrap().url(), before);
    assert!(store.resolve(&before).is_some());
    assert_eq!(s.phase(), SessionPhase::Idle);
}

#[test]
fn malformed_logo_fails_in_compositing() {
    let mut s = session_with(Box::new(SolidEncoder));
    s.set_text("hello");
    s.set_logo(Some(b"definitely not an image".to_vec()));

    let err = s.generate().unwrap_err();
    assert!(matches!(err, QrLogoError::LogoDecode(_)));
    assert!(s.error().unwrap().starts_with("logo compositing failed:"));
    assert!(s.current_handle().is_none());
}

#[test]
fn logo_is_drawn_over_the_center() {
    let mut s = session_with(Box::new(SolidEncoder));
    s.set_text("hello");
    s.set_dark_color(Rgb::new(255, 0, 0));
    s.set_light_color(Rgb::WHITE);
    s.set_logo(Some(png_logo(16, 16)));

    let handle = s.generate().unwrap();
    let bytes = handle.bytes();
    let img = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (450, 450));
    // The logo is opaque black; the surrounding modules are red.
    assert_eq!(img.get_pixel(225, 225).0, [0, 0, 0, 255]);
    assert_eq!(img.get_pixel(100, 225).0, [255, 0, 0, 255]);
}

#[test]
fn set_logo_path_reads_file_bytes() {
    let path = std::env::temp_dir().join(format!("qrlogo_state_logo_{}.png", std::process::id()));
    std::fs::write(&path, png_logo(4, 4)).unwrap();

    let mut s = session_with(Box::new(SolidEncoder));
    s.set_logo_path(&path).unwrap();
    assert!(s.request().logo.is_some());
    assert!(s.set_logo_path(path.with_extension("missing")).is_err());

    std::fs::remove_file(&path).ok();
}

#[test]
fn release_revokes_and_download_requires_a_handle() {
    let dir = std::env::temp_dir().join(format!("qrlogo_state_dl_{}", std::process::id()));
    let mut s = session_with(Box::new(SolidEncoder));
    assert!(s.download_to(&dir).unwrap().is_none());

    s.set_text("hello");
    s.generate().unwrap();
    let path = s.download_to(&dir).unwrap().unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("qr-450x450-"));
    assert!(name.ends_with(".png"));
    assert!(path.is_file());

    s.release();
    assert!(s.current_handle().is_none());
    assert_eq!(s.store().live_count(), 0);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn shared_session_reports_busy_while_locked() {
    let mut s = session_with(Box::new(SolidEncoder));
    s.set_text("hello");
    let shared = SharedSession::new(s);

    let guard = shared.inner.lock().unwrap();
    let other = shared.clone();
    let res = std::thread::spawn(move || other.try_generate()).join().unwrap();
    assert!(matches!(res, Err(QrLogoError::Busy)));
    drop(guard);

    let url = shared.try_generate().unwrap();
    assert!(shared.with(|s| s.store().resolve(&url).is_some()));
}

/// Blocks inside `encode` until the test releases it.
struct GatedEncoder {
    entered: Arc<Barrier>,
    release: Arc<Barrier>,
}

impl MatrixEncoder for GatedEncoder {
    fn encode(&self, text: &str, ec_level: EcLevel) -> QrLogoResult<ModuleMatrix> {
        self.entered.wait();
        self.release.wait();
        SolidEncoder.encode(text, ec_level)
    }
}

#[test]
fn generating_flag_is_visible_from_other_threads() {
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let mut s = session_with(Box::new(GatedEncoder {
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
    }));
    s.set_text("hello");
    let shared = SharedSession::new(s);
    assert!(!shared.is_generating());

    let worker = {
        let shared = shared.clone();
        std::thread::spawn(move || shared.try_generate())
    };
    entered.wait();
    assert!(shared.is_generating());
    assert!(matches!(shared.try_generate(), Err(QrLogoError::Busy)));
    release.wait();

    assert!(worker.join().unwrap().is_ok());
    assert!(!shared.is_generating());
    assert!(shared.with(|s| !s.is_generating() && s.phase() == SessionPhase::Idle));
}

#[test]
fn generating_flag_clears_after_failure() {
    let mut s = session_with(Box::new(FailingEncoder));
    s.set_text("hello");
    assert!(s.generate().is_err());
    assert!(!s.is_generating());
    assert_eq!(s.phase(), SessionPhase::Idle);
}

#[test]
fn encode_failure_joins_a_panicked_logo_worker() {
    let mut req = GenerationRequest::new("hello");
    req.logo = Some(Arc::new(vec![1, 2, 3]));
    let opts = SessionOpts::default();

    let res = std::thread::scope(|scope| {
        let pending = PendingLogo::spawn_with(scope, || -> QrLogoResult<DecodedLogo> {
            panic!("decoder crashed")
        });
        compose(&req, &opts, &FailingEncoder, Some(pending))
    });
    let Err(failure) = res else {
        panic!("expected encode failure");
    };
    assert_eq!(failure.stage, PipelineStage::Encode);
    assert!(matches!(failure.error, QrLogoError::EncodingCapacity(_)));
}

#[test]
fn encode_failure_wins_over_a_bad_logo() {
    let mut s = session_with(Box::new(FailingEncoder));
    s.set_text("hello");
    s.set_logo(Some(b"not an image".to_vec()));
    let err = s.generate().unwrap_err();
    assert!(matches!(err, QrLogoError::EncodingCapacity(_)));
    assert!(s.error().unwrap().starts_with("matrix encoding failed:"));
}

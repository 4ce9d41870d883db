use super::*;
use crate::foundation::core::Rgba8Premul;

#[test]
fn png_round_trip_preserves_pixels() {
    let mut s = RenderSurface::filled(5, 4, Rgba8Premul::from_straight_rgba(232, 88, 244, 255))
        .unwrap();
    let i = s.index(1, 2);
    s.data[i..i + 4].copy_from_slice(&[255, 255, 255, 255]);

    let encoded = export(&s, ExportFormat::Png, ExportQuality::Best).unwrap();
    assert_eq!((encoded.width, encoded.height), (5, 4));
    assert!(encoded.bytes.starts_with(&[0x89, b'P', b'N', b'G']));

    let decoded = image::load_from_memory(&encoded.bytes).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (5, 4));
    assert_eq!(decoded.get_pixel(0, 0).0, [232, 88, 244, 255]);
    assert_eq!(decoded.get_pixel(1, 2).0, [255, 255, 255, 255]);
}

#[test]
fn quality_changes_effort_not_pixels() {
    let s = RenderSurface::filled(16, 16, Rgba8Premul::from_straight_rgba(1, 2, 3, 255)).unwrap();
    let best = export(&s, ExportFormat::Png, ExportQuality::Best).unwrap();
    let fast = export(&s, ExportFormat::Png, ExportQuality::Fast).unwrap();
    let a = image::load_from_memory(&best.bytes).unwrap().to_rgba8();
    let b = image::load_from_memory(&fast.bytes).unwrap().to_rgba8();
    assert_eq!(a, b);
}

#[test]
fn zero_area_surface_fails_to_encode() {
    let s = RenderSurface {
        width: 0,
        height: 0,
        data: Vec::new(),
    };
    assert!(matches!(
        export(&s, ExportFormat::Png, ExportQuality::Best),
        Err(QrLogoError::Encoding(_))
    ));
}

#[test]
fn format_metadata() {
    assert_eq!(ExportFormat::Png.mime_type(), "image/png");
    assert_eq!(ExportFormat::Png.extension(), "png");
}

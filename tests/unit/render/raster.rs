use super::*;

fn checker(dimension: usize) -> ModuleMatrix {
    let modules = (0..dimension * dimension)
        .map(|i| (i % dimension + i / dimension) % 2 == 0)
        .collect();
    ModuleMatrix::from_modules(dimension, modules).unwrap()
}

const DARK: Rgb = Rgb::new(10, 20, 30);
const LIGHT: Rgb = Rgb::new(250, 240, 230);

#[test]
fn margin_bands_switch_at_edges() {
    let p = MarginPolicy::default();
    assert_eq!(p.margin_for_size(1), 1);
    assert_eq!(p.margin_for_size(300), 1);
    assert_eq!(p.margin_for_size(301), 2);
    assert_eq!(p.margin_for_size(500), 2);
    assert_eq!(p.margin_for_size(501), 3);
    assert_eq!(p.margin_for_size(800), 3);
}

#[test]
fn margin_bands_are_order_independent() {
    let p = MarginPolicy {
        bands: vec![
            MarginBand {
                max_size: 500,
                margin: 2,
            },
            MarginBand {
                max_size: 300,
                margin: 1,
            },
        ],
        fallback: 4,
    };
    assert_eq!(p.margin_for_size(200), 1);
    assert_eq!(p.margin_for_size(400), 2);
    assert_eq!(p.margin_for_size(900), 4);
}

#[test]
fn surface_is_exactly_size_squared() {
    for size in [29u32, 100, 301, 450, 777] {
        let s = render(&checker(21), size, 2, DARK, LIGHT).unwrap();
        assert_eq!((s.width, s.height), (size, size));
        assert_eq!(s.data.len(), (size * size * 4) as usize);
    }
}

#[test]
fn integer_scale_places_modules_exactly() {
    // 21 modules + 2*2 margin = 25 modules, 250px -> 10px per module.
    let s = render(&checker(21), 250, 2, DARK, LIGHT).unwrap();
    let dark = [10, 20, 30, 255];
    let light = [250, 240, 230, 255];

    // Quiet zone.
    assert_eq!(s.pixel(0, 0), light);
    assert_eq!(s.pixel(19, 19), light);
    assert_eq!(s.pixel(249, 249), light);
    // Module (0,0) is dark, module (1,0) light.
    assert_eq!(s.pixel(20, 20), dark);
    assert_eq!(s.pixel(29, 29), dark);
    assert_eq!(s.pixel(30, 20), light);
    // Module (20,20) is dark and ends right at the margin.
    assert_eq!(s.pixel(229, 229), dark);
    assert_eq!(s.pixel(230, 229), light);
}

#[test]
fn fractional_scale_still_fills_every_pixel() {
    let s = render(&checker(21), 301, 2, DARK, LIGHT).unwrap();
    for px in s.data.chunks_exact(4) {
        assert!(px == [10, 20, 30, 255] || px == [250, 240, 230, 255]);
    }
}

#[test]
fn sub_pixel_modules_are_rejected() {
    assert!(matches!(
        render(&checker(21), 24, 2, DARK, LIGHT),
        Err(QrLogoError::InvalidDimension(_))
    ));
    assert!(render(&checker(21), 25, 2, DARK, LIGHT).is_ok());
    assert!(matches!(
        RasterLayout::new(21, 0, 0),
        Err(QrLogoError::InvalidDimension(_))
    ));
}

#[test]
fn render_is_deterministic() {
    let a = render(&checker(25), 333, 2, DARK, LIGHT).unwrap();
    let b = render(&checker(25), 333, 2, DARK, LIGHT).unwrap();
    assert_eq!(a, b);
}

#[test]
fn fractional_scale_partitions_pixels_evenly() {
    // 21 modules + 2*2 margin.
    let total = 25u32;
    for size in 128u32..=1000 {
        let layout = RasterLayout::new(21, size, 2).unwrap();
        let mut counts = vec![0u32; total as usize];
        let mut quiet = 0u32;
        let mut prev = None;
        for p in 0..size {
            match layout.module_at(p) {
                Some(m) => {
                    assert!(prev.is_none_or(|q| m >= q), "size {size}: modules out of order");
                    prev = Some(m);
                    counts[m + 2] += 1;
                }
                None => quiet += 1,
            }
        }
        let (lo, hi) = (size / total, size.div_ceil(total));
        for (cell, &n) in counts[2..23].iter().enumerate() {
            assert!(n == lo || n == hi, "size {size}: module {cell} spans {n}px");
        }
        assert!(quiet >= 4 * lo && quiet <= 4 * hi, "size {size}: quiet zone {quiet}px");
    }
}

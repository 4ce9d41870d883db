use std::thread::{Scope, ScopedJoinHandle};

use crate::foundation::error::{QrLogoError, QrLogoResult};

/// Decoded logo in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub(crate) struct DecodedLogo {
    /// Width in pixels.
    pub(crate) width: u32,
    /// Height in pixels.
    pub(crate) height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub(crate) rgba8_premul: Vec<u8>,
}

impl DecodedLogo {
    pub(crate) fn into_image(self) -> QrLogoResult<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.rgba8_premul)
            .ok_or_else(|| QrLogoError::logo_decode("decoded logo buffer size mismatch"))
    }
}

/// Decode arbitrary image bytes (any format `image` can sniff) into premultiplied RGBA8.
pub(crate) fn decode_logo(bytes: &[u8]) -> QrLogoResult<DecodedLogo> {
    if bytes.is_empty() {
        return Err(QrLogoError::logo_decode("logo is empty"));
    }
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| QrLogoError::logo_decode(format!("unsupported or corrupt image: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(QrLogoError::logo_decode("logo has zero area"));
    }

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(DecodedLogo {
        width,
        height,
        rgba8_premul,
    })
}

/// Logo decode running on a scoped worker thread.
///
/// The scope joins the worker on every exit path, so a generation that fails before reaching the
/// compositor never leaves a decode behind.
pub(crate) struct PendingLogo<'scope> {
    handle: ScopedJoinHandle<'scope, QrLogoResult<DecodedLogo>>,
}

impl<'scope> PendingLogo<'scope> {
    pub(crate) fn spawn<'env>(scope: &'scope Scope<'scope, 'env>, bytes: &'env [u8]) -> Self {
        Self::spawn_with(scope, move || decode_logo(bytes))
    }

    pub(crate) fn spawn_with<'env, F>(scope: &'scope Scope<'scope, 'env>, decode: F) -> Self
    where
        F: FnOnce() -> QrLogoResult<DecodedLogo> + Send + 'scope,
    {
        Self {
            handle: scope.spawn(decode),
        }
    }

    /// Block until the decode finishes.
    pub(crate) fn wait(self) -> QrLogoResult<DecodedLogo> {
        self.handle
            .join()
            .map_err(|_| QrLogoError::logo_decode("logo decoder panicked"))?
    }
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;

//! Matrix encoding seam. The QR algorithm itself comes from the `qrcode` crate.

pub(crate) mod encoder;

//! QR discovery: find the first QR payload embedded in an upload.
//!
//! ## PDFs
//!
//! A PDF invoice rarely *is* a picture; the QR code is an image object placed
//! on a page, often inside a form XObject reused as a stamp. pdfium
//! enumerates each page's objects in paint order, forms are entered in place,
//! and every image object is decoded on its own until one yields a payload.
//! Nothing is rasterised. The library is located by `pdfium-auto`.
//!
//! ## Raster uploads
//!
//! PNG/JPEG bytes are decoded with `image`, converted to greyscale and handed
//! to `rqrr` directly.
//!
//! ## Threading
//!
//! pdfium is a C++ library with thread-local state, and QR grid detection is
//! CPU-bound. Both run on the blocking pool so Tokio workers keep serving
//! other requests.
//!
//! Every failure in here is a [`ScanError`] that stops at [`QrScanner::scan`]:
//! QR verification is a bonus signal, never a reason to fail a request.

use crate::error::ScanError;
use crate::output::UploadedDocument;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Locates an embedded QR payload in PDF or raster uploads.
#[derive(Debug, Clone, Default)]
pub struct QrScanner {
    pdfium_lib_path: Option<PathBuf>,
}

impl QrScanner {
    /// `pdfium_lib_path` may name the library file or the directory holding
    /// it. `None` falls back to `PDFIUM_LIB_PATH`, the download cache and
    /// finally the system library.
    pub fn new(pdfium_lib_path: Option<PathBuf>) -> Self {
        Self { pdfium_lib_path }
    }

    /// Return the content of the first QR code found, or `None`.
    ///
    /// Never fails: decode problems are logged at `warn` and reported as
    /// "no payload".
    pub async fn scan(&self, document: UploadedDocument) -> Option<String> {
        let lib_path = self.pdfium_lib_path.clone();

        let outcome =
            tokio::task::spawn_blocking(move || scan_blocking(&document, lib_path.as_deref()))
                .await
                .map_err(|e| ScanError::TaskAborted(e.to_string()))
                .and_then(|r| r);

        match outcome {
            Ok(Some(payload)) => {
                info!(payload = %payload, "QR code found");
                Some(payload)
            }
            Ok(None) => {
                debug!("No QR code in document");
                None
            }
            Err(e) => {
                warn!(error = %e, "QR scan warning: could not process file");
                None
            }
        }
    }
}

/// Blocking implementation of [`QrScanner::scan`], with errors kept visible.
pub fn scan_blocking(
    document: &UploadedDocument,
    pdfium_lib_path: Option<&Path>,
) -> Result<Option<String>, ScanError> {
    if document.is_pdf() {
        scan_pdf(&document.bytes, pdfium_lib_path)
    } else {
        scan_image(&document.bytes)
    }
}

/// Decode a raster upload and look for a QR code in it.
pub fn scan_image(bytes: &[u8]) -> Result<Option<String>, ScanError> {
    let image =
        image::load_from_memory(bytes).map_err(|e| ScanError::ImageDecode(e.to_string()))?;
    debug!("Decoded image {}x{} px", image.width(), image.height());
    Ok(decode_qr(&image))
}

/// Walk every page's objects in paint order; first decodable QR wins.
///
/// Form XObjects are entered as they are met, so an image nested in a form
/// is tried before the page's next object.
pub fn scan_pdf(bytes: &[u8], pdfium_lib_path: Option<&Path>) -> Result<Option<String>, ScanError> {
    let pdfium = pdfium_auto::bind_pdfium(pdfium_lib_path)
        .map_err(|e| ScanError::PdfiumUnavailable(e.to_string()))?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| ScanError::CorruptPdf(format!("{:?}", e)))?;

    for (page_index, page) in document.pages().iter().enumerate() {
        let page_number = page_index + 1;
        let found = page
            .objects()
            .iter()
            .find_map(|object| decode_object(&object, page_number));
        if let Some(payload) = found {
            debug!("QR code found on page {}", page_number);
            return Ok(Some(payload));
        }
    }

    Ok(None)
}

fn decode_object(object: &PdfPageObject<'_>, page_number: usize) -> Option<String> {
    if let Some(image_object) = object.as_image_object() {
        return match image_object.get_raw_image() {
            Ok(image) => decode_qr(&image),
            Err(e) => {
                debug!("Skipping unreadable image on page {}: {:?}", page_number, e);
                None
            }
        };
    }

    let form = object.as_x_object_form_object()?;
    form.iter().find_map(|child| decode_object(&child, page_number))
}

/// Return the content of the first QR grid in `image` that decodes.
pub fn decode_qr(image: &DynamicImage) -> Option<String> {
    let luma = image.to_luma8();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        luma.width() as usize,
        luma.height() as usize,
        |x, y| luma.get_pixel(x as u32, y as u32)[0],
    );

    prepared
        .detect_grids()
        .into_iter()
        .find_map(|grid| match grid.decode() {
            Ok((_meta, content)) => Some(content),
            Err(e) => {
                debug!("QR grid found but not decodable: {:?}", e);
                None
            }
        })
}

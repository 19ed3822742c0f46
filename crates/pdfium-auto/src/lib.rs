//! # pdfium-auto
//!
//! Find a usable [PDFium](https://pdfium.googlesource.com/pdfium/) shared
//! library for the QR scanner, downloading it once if the host has none.
//!
//! ## Resolution order
//!
//! [`bind_pdfium`] tries, first match wins:
//!
//! 1. An explicit path (the library file, or the directory holding it).
//! 2. `PDFIUM_LIB_PATH`, with the same file-or-directory rules.
//! 3. The per-version cache, `~/.cache/aria-rwa/pdfium-{VERSION}/`.
//! 4. The system library search path.
//!
//! [`ensure_pdfium_library`] fills the cache from
//! [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries)
//! when steps 1-3 come up empty. It blocks; call it from
//! `spawn_blocking` at startup so request handling never waits on it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pdfium_auto::{bind_pdfium, ensure_pdfium_library};
//!
//! let path = ensure_pdfium_library().expect("download failed");
//! let pdfium = bind_pdfium(Some(&path)).expect("bind failed");
//! ```
//!
//! ## Environment variable overrides
//!
//! - `PDFIUM_LIB_PATH`: an existing library (file or directory); skips download.
//! - `PDFIUM_AUTO_CACHE_DIR`: replaces the default cache root.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use pdfium_render::prelude::Pdfium;
use thiserror::Error;
use tracing::{debug, info, warn};

// ── Public constants ─────────────────────────────────────────────────────────

/// The pdfium-binaries release tag used for downloads.
pub const PDFIUM_VERSION: &str = "7690";

/// GitHub release base URL.
const BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Directory name under the user cache root.
const CACHE_NAMESPACE: &str = "aria-rwa";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned while locating, fetching or loading PDFium.
#[derive(Error, Debug)]
pub enum PdfiumAutoError {
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Archive extraction failed: {0}")]
    Extract(String),

    #[error("Failed to bind PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },

    #[error("No PDFium library on the system search path: {0}")]
    SystemLibrary(String),
}

// ── Platform metadata ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PlatformInfo {
    /// Asset filename in the GitHub release.
    archive_name: &'static str,
    /// Path of the library inside the archive.
    lib_path_in_archive: &'static str,
    /// Filename written to the cache.
    lib_name: &'static str,
}

fn platform_for(os: &str, arch: &str) -> Result<PlatformInfo, PdfiumAutoError> {
    let (archive_name, lib_path_in_archive, lib_name) = match (os, arch) {
        ("macos", "aarch64") => ("pdfium-mac-arm64.tgz", "lib/libpdfium.dylib", "libpdfium.dylib"),
        ("macos", "x86_64") => ("pdfium-mac-x64.tgz", "lib/libpdfium.dylib", "libpdfium.dylib"),
        ("linux", "x86_64") => ("pdfium-linux-x64.tgz", "lib/libpdfium.so", "libpdfium.so"),
        ("linux", "aarch64") => ("pdfium-linux-arm64.tgz", "lib/libpdfium.so", "libpdfium.so"),
        ("windows", "x86_64") => ("pdfium-win-x64.tgz", "bin/pdfium.dll", "pdfium.dll"),
        ("windows", "aarch64") => ("pdfium-win-arm64.tgz", "bin/pdfium.dll", "pdfium.dll"),
        (os, arch) => {
            return Err(PdfiumAutoError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })
        }
    };
    Ok(PlatformInfo {
        archive_name,
        lib_path_in_archive,
        lib_name,
    })
}

fn detect_platform() -> Result<PlatformInfo, PdfiumAutoError> {
    platform_for(std::env::consts::OS, std::env::consts::ARCH)
}

// ── Cache directory resolution ───────────────────────────────────────────────

/// Per-version cache directory for the PDFium library.
///
/// Defaults to `{user cache dir}/aria-rwa/pdfium-{VERSION}`; set
/// `PDFIUM_AUTO_CACHE_DIR` to move the root.
pub fn pdfium_cache_dir() -> PathBuf {
    cache_dir_under(std::env::var_os("PDFIUM_AUTO_CACHE_DIR"))
}

fn cache_dir_under(root_override: Option<OsString>) -> PathBuf {
    let version_dir = format!("pdfium-{PDFIUM_VERSION}");
    if let Some(root) = root_override {
        return PathBuf::from(root).join(version_dir);
    }

    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_NAMESPACE)
        .join(version_dir)
}

/// Turn a user-supplied path into a library file path.
///
/// A directory is joined with the platform library name; anything else is
/// taken as the file itself.
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// On-disk library from `PDFIUM_LIB_PATH` or the cache, if one exists.
///
/// Never touches the network.
pub fn cached_pdfium_path() -> Option<PathBuf> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Some(path.clone());
    }
    if let Some(p) = std::env::var_os("PDFIUM_LIB_PATH") {
        let file = library_file(Path::new(&p));
        if file.exists() {
            return Some(file);
        }
    }
    let info = detect_platform().ok()?;
    let cached = pdfium_cache_dir().join(info.lib_name);
    cached.exists().then_some(cached)
}

/// Make sure a PDFium library is on disk and return its path.
///
/// Uses [`cached_pdfium_path`] when it finds something; otherwise downloads
/// the platform archive once and extracts the library into
/// [`pdfium_cache_dir`]. Blocking. Safe to call from several threads; the
/// first success is remembered for the rest of the process.
pub fn ensure_pdfium_library() -> Result<PathBuf, PdfiumAutoError> {
    if let Some(path) = cached_pdfium_path() {
        debug!(path = %path.display(), "PDFium already available");
        let _ = RESOLVED_PATH.set(path.clone());
        return Ok(path);
    }
    if std::env::var_os("PDFIUM_LIB_PATH").is_some() {
        warn!("PDFIUM_LIB_PATH does not name a library; downloading PDFium instead");
    }

    let info = detect_platform()?;
    let cache_dir = pdfium_cache_dir();
    let url = format!("{BASE_URL}/chromium%2F{PDFIUM_VERSION}/{}", info.archive_name);

    info!(%url, dest = %cache_dir.display(), "Downloading PDFium");
    fs::create_dir_all(&cache_dir).map_err(PdfiumAutoError::CacheDir)?;
    let archive = download_bytes(&url)?;
    let lib_path = cache_dir.join(info.lib_name);
    extract_library(&archive, info.lib_path_in_archive, &lib_path)?;
    info!(path = %lib_path.display(), "PDFium cached");

    let _ = RESOLVED_PATH.set(lib_path.clone());
    Ok(lib_path)
}

/// Bind PDFium following the resolution order in the crate docs.
///
/// Does not download; a host with no library anywhere gets
/// [`PdfiumAutoError::SystemLibrary`].
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, PdfiumAutoError> {
    if let Some(path) = explicit {
        return bind_pdfium_from_path(&library_file(path));
    }
    if let Some(path) = cached_pdfium_path() {
        return bind_pdfium_from_path(&path);
    }
    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| PdfiumAutoError::SystemLibrary(format!("{e:?}")))
}

/// Bind the library file at `path`, bypassing every lookup.
pub fn bind_pdfium_from_path(path: &Path) -> Result<Pdfium, PdfiumAutoError> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| PdfiumAutoError::Bind {
            path: path.to_path_buf(),
            reason: format!("{e:?}"),
        })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn download_bytes(url: &str) -> Result<Vec<u8>, PdfiumAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| PdfiumAutoError::Download(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| PdfiumAutoError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(PdfiumAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .map_err(|e| PdfiumAutoError::Download(format!("Read error: {e}")))?;
    debug!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

/// Extract `lib_path_in_archive` from a gzipped tar into `dest_path`.
///
/// The entry is unpacked next to `dest_path` and renamed into place, so a
/// concurrent reader never sees a half-written library.
fn extract_library(
    archive_bytes: &[u8],
    lib_path_in_archive: &str,
    dest_path: &Path,
) -> Result<(), PdfiumAutoError> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let mut archive = Archive::new(GzDecoder::new(archive_bytes));
    let entries = archive
        .entries()
        .map_err(|e| PdfiumAutoError::Extract(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| PdfiumAutoError::Extract(e.to_string()))?;
        let matches = entry
            .path()
            .map_err(|e| PdfiumAutoError::Extract(e.to_string()))?
            .to_string_lossy()
            == lib_path_in_archive;
        if !matches {
            continue;
        }

        let partial = dest_path.with_extension("partial");
        entry
            .unpack(&partial)
            .map_err(|e| PdfiumAutoError::Extract(format!("Unpack failed: {e}")))?;
        fs::rename(&partial, dest_path).map_err(PdfiumAutoError::CacheDir)?;
        return Ok(());
    }

    Err(PdfiumAutoError::Extract(format!(
        "Library '{lib_path_in_archive}' not found in archive"
    )))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn tgz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pdfium-auto-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn current_platform_is_supported() {
        detect_platform().expect("current platform should be supported");
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let err = platform_for("haiku", "x86_64").unwrap_err();
        assert!(err.to_string().contains("haiku/x86_64"), "got: {err}");
    }

    #[test]
    fn library_name_matches_archive_entry() {
        for (os, arch) in [("macos", "aarch64"), ("linux", "x86_64"), ("windows", "x86_64")] {
            let info = platform_for(os, arch).unwrap();
            assert!(info.lib_path_in_archive.ends_with(info.lib_name), "{os}/{arch}");
            assert!(info.archive_name.ends_with(".tgz"));
        }
    }

    #[test]
    fn default_cache_dir_is_namespaced_and_versioned() {
        let dir = cache_dir_under(None);
        assert!(dir.ends_with(format!("{CACHE_NAMESPACE}/pdfium-{PDFIUM_VERSION}")));
    }

    #[test]
    fn cache_root_override_keeps_version_dir() {
        let dir = cache_dir_under(Some("/tmp/aria-cache".into()));
        assert_eq!(dir, PathBuf::from(format!("/tmp/aria-cache/pdfium-{PDFIUM_VERSION}")));
    }

    #[test]
    fn directory_resolves_to_platform_library_name() {
        let dir = scratch_dir("libdir");
        let file = library_file(&dir);
        assert_eq!(file.parent(), Some(dir.as_path()));
        assert!(file.to_string_lossy().contains("pdfium"));

        let explicit = dir.join("custom-pdfium.so");
        assert_eq!(library_file(&explicit), explicit);
    }

    #[test]
    fn extracts_only_the_requested_entry() {
        let dir = scratch_dir("extract");
        let dest = dir.join("libpdfium.so");
        let archive = tgz(&[
            ("include/fpdfview.h", b"header"),
            ("lib/libpdfium.so", b"\x7fELF fake library"),
        ]);

        extract_library(&archive, "lib/libpdfium.so", &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"\x7fELF fake library");
        assert!(!dest.with_extension("partial").exists());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn missing_entry_is_extract_error() {
        let dir = scratch_dir("missing");
        let archive = tgz(&[("lib/other.so", b"x")]);
        let dest = dir.join("libpdfium.so");
        let err = extract_library(&archive, "lib/libpdfium.so", &dest).unwrap_err();
        assert!(matches!(err, PdfiumAutoError::Extract(_)), "got: {err:?}");
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn garbage_archive_is_extract_error() {
        let dir = scratch_dir("garbage");
        let dest = dir.join("libpdfium.so");
        let err = extract_library(b"not gzip", "lib/libpdfium.so", &dest).unwrap_err();
        assert!(matches!(err, PdfiumAutoError::Extract(_)), "got: {err:?}");
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn bind_from_missing_file_reports_path() {
        let err = bind_pdfium_from_path(Path::new("/nonexistent/libpdfium.so")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/libpdfium.so"), "got: {err}");
    }
}

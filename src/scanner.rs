//! QR scan sessions.
//!
//! A [`ScanSource`] is the hardware seam: anything that can block on a
//! decode attempt and be released. The session owns a background decode
//! loop and hands normalized codes to async consumers over a channel.
//! Dropping the session stops the loop, so navigating away from the scan
//! surface always releases the camera.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Why a scan source could not start or keep running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    PermissionDenied,
    NoCamera,
    CameraInUse,
    Unsupported,
}

impl ScanError {
    /// User-facing message for the scan surface.
    pub fn message(&self) -> &'static str {
        match self {
            ScanError::PermissionDenied => {
                "ไม่ได้รับอนุญาตให้ใช้กล้อง กรุณาเปิดสิทธิ์การใช้กล้องในการตั้งค่า"
            }
            ScanError::NoCamera => "ไม่พบกล้องในอุปกรณ์นี้",
            ScanError::CameraInUse => "กล้องถูกใช้งานโดยแอปอื่นอยู่ กรุณาปิดแอปนั้นแล้วลองใหม่",
            ScanError::Unsupported => "อุปกรณ์นี้ไม่รองรับการสแกน QR",
        }
    }
}

/// Blocking decode source. `next_decode` returns `Ok(Some(code))` on a
/// successful decode, `Ok(None)` when no code is in frame, and `Err` when
/// the source has failed and the session must end.
pub trait ScanSource: Send + 'static {
    fn next_decode(&mut self) -> Result<Option<String>, ScanError>;

    /// Release the underlying device. Called exactly once, when the decode
    /// loop exits.
    fn release(&mut self);
}

/// How long the decode loop idles after an empty frame.
const IDLE_POLL: Duration = Duration::from_millis(150);

/// Decoded payloads longer than this (in characters) are noise, not item
/// codes.
const MAX_CODE_LEN: usize = 64;

/// A running scan session. Codes arrive trimmed and uppercased.
pub struct ScanSession {
    running: Arc<AtomicBool>,
    rx: mpsc::Receiver<String>,
}

impl ScanSession {
    /// Start the decode loop on the blocking pool.
    pub fn start<S: ScanSource>(mut source: S) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let (tx, rx) = mpsc::channel::<String>(16);

        tokio::task::spawn_blocking(move || {
            info!("scan session started");
            let mut last_code: Option<String> = None;
            while flag.load(Ordering::SeqCst) {
                match source.next_decode() {
                    Ok(Some(raw)) => {
                        let code = raw.trim().to_uppercase();
                        // bound is in characters; Thai item codes are
                        // multi-byte
                        let chars = code.chars().count();
                        if chars == 0 || chars > MAX_CODE_LEN {
                            debug!(chars, "dropping out-of-range decode");
                            continue;
                        }
                        // the decoder re-reports a code every frame it stays
                        // in view; only emit it once per appearance
                        if last_code.as_deref() == Some(code.as_str()) {
                            continue;
                        }
                        last_code = Some(code.clone());
                        if tx.blocking_send(code).is_err() {
                            // consumer gone
                            break;
                        }
                    }
                    Ok(None) => {
                        // code left the frame; the next appearance counts again
                        last_code = None;
                        std::thread::sleep(IDLE_POLL);
                    }
                    Err(e) => {
                        warn!("scan source failed: {}", e.message());
                        break;
                    }
                }
            }
            source.release();
            info!("scan session ended, source released");
        });

        Self { running, rx }
    }

    /// Next decoded code, or `None` once the session has ended.
    pub async fn next(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the decode loop to stop. The source is released by the loop
    /// itself, not here.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

// ===========================================================================
// Tests
// ===========================================================================

//! Host capability detection
//!
//! Optional host features are queried once at startup and cached in a
//! [`Capabilities`] descriptor.

use tracing::info;

/// Queries the host for optional features
pub trait CapabilityProbe {
    /// Whether speech capture (recognition) is available
    fn capture_available(&self) -> bool;

    /// Whether speech synthesis is available
    fn synthesis_available(&self) -> bool;
}

/// Which optional host features are usable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub capture: bool,
    pub synthesis: bool,
    pub secure_context: bool,
}

impl Capabilities {
    /// Probe the host once; `endpoint` decides whether the context is secure
    pub fn detect(probe: &dyn CapabilityProbe, endpoint: &str) -> Self {
        let capabilities = Self {
            capture: probe.capture_available(),
            synthesis: probe.synthesis_available(),
            secure_context: is_secure_endpoint(endpoint),
        };
        info!(
            capture = capabilities.capture,
            synthesis = capabilities.synthesis,
            secure_context = capabilities.secure_context,
            "Detected host capabilities"
        );
        capabilities
    }

    /// Capture needs both the engine and a secure context
    pub fn capture_usable(&self) -> bool {
        self.capture && self.secure_context
    }

    /// Why capture cannot be used, if it cannot
    pub fn capture_blocker(&self) -> Option<&'static str> {
        if !self.capture {
            Some("音声認識")
        } else if !self.secure_context {
            Some("HTTPS以外の接続での音声認識")
        } else {
            None
        }
    }
}

/// `https` endpoints and loopback hosts count as secure
pub fn is_secure_endpoint(endpoint: &str) -> bool {
    let endpoint = endpoint.trim();
    if endpoint.starts_with("https://") {
        return true;
    }
    let Some(rest) = endpoint.strip_prefix("http://") else {
        return false;
    };
    let authority = rest.split('/').next().unwrap_or_default();
    let host = if authority.starts_with('[') {
        authority
            .split(']')
            .next()
            .map(|h| h.trim_start_matches('['))
            .unwrap_or_default()
    } else {
        authority.split(':').next().unwrap_or_default()
    };
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

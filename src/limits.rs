/*
    imgcore::limits

    Open-time knobs (§3.1): cache sizing and how strictly a plugin should
    treat deviations from its format's nominal grammar.
*/

/// Bounds on the resources a format plugin may allocate while an image is
/// open. Plugins that don't cache (CloneCD) ignore `max_cache_bytes`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Soft cap, in bytes, on decompressed cluster / sector cache memory.
    pub max_cache_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_cache_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Caller-supplied knobs passed to [`crate::Registry::open`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct OpenOptions {
    pub limits: Limits,
    /// Reject descriptors that deviate from the nominal CloneCD grammar
    /// (unknown keys, out-of-range track modes) instead of skipping them.
    pub strict_ccd: bool,
}

impl OpenOptions {
    pub fn new() -> Self {
        OpenOptions::default()
    }

    pub fn with_max_cache_bytes(mut self, bytes: u64) -> Self {
        self.limits.max_cache_bytes = bytes;
        self
    }

    pub fn with_strict_ccd(mut self, strict: bool) -> Self {
        self.strict_ccd = strict;
        self
    }
}

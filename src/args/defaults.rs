pub(crate) const DEFAULT_USER_AGENT: &str = concat!("loadprobe/", env!("CARGO_PKG_VERSION"));

/// Sent on full-page fetches so servers render the same page a browser gets.
pub(crate) const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";


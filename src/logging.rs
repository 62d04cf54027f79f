//! Internal logging bootstrap for the cover tree crate.
//!
//! Installs a `tracing` subscriber at startup, gated behind the `setup_tracing` feature
//! so that library consumers who install their own subscriber are never surprised by one
//! appearing underneath them. Verbosity is controlled by the `DEBUG_COVER_TREE`
//! environment variable; if it is unset or falsy ("0", "false", or empty) logging stays
//! disabled.

#[cfg(feature = "setup_tracing")]
use ctor::ctor;
#[cfg(feature = "setup_tracing")]
use tracing::Level;

#[cfg(feature = "setup_tracing")]
#[ctor]
fn set_debug_level() {
    if std::env::var("DEBUG_COVER_TREE").map_or(true, |v| v == "0" || v == "false" || v.is_empty())
    {
        // Disable logging
    } else {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .init();
    }
}

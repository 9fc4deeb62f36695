//! Tracing setup for embedding processes and tests
//!
//! The engine instruments its own operations (client lifecycle, retrieval
//! fan-out, budget enforcement) with `tracing` and never installs a
//! global subscriber on its own. Embedders that want those events without
//! wiring their own subscriber call [`init_tracing`] once; repeated calls
//! are no-ops, and a subscriber installed by the host process wins.
//!
//! `RUST_LOG` takes precedence over the fallback directives:
//! ```bash
//! RUST_LOG=symscope=debug cargo test
//! RUST_LOG=symscope::lsp=trace my-embedding-binary
//! ```

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Filter directives used when `RUST_LOG` is unset: engine warnings only,
/// so an embedding process stays quiet unless it opts in.
pub const DEFAULT_DIRECTIVES: &str = "symscope=warn";

/// Install a stderr subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_DIRECTIVES`].
pub fn init_tracing() {
    init_tracing_with(DEFAULT_DIRECTIVES);
}

/// Install a stderr subscriber with explicit fallback directives for when
/// `RUST_LOG` is unset. Only the first call takes effect, and an already
/// installed global subscriber is left in place.
pub fn init_tracing_with(default_directives: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init();
    });
}

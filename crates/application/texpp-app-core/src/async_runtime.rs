use anyhow::Result;
use std::sync::OnceLock;

static RUNTIME: OnceLock<std::result::Result<tokio::runtime::Runtime, String>> = OnceLock::new();

/// Runtime shared by every background worker thread. Never call `block_on`
/// on it from a thread that is already inside a runtime.
pub(crate) fn runtime() -> Result<&'static tokio::runtime::Runtime> {
    let built = RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("texpp-rt")
            .build()
            .map_err(|e| e.to_string())
    });
    built
        .as_ref()
        .map_err(|message| anyhow::anyhow!("async runtime unavailable: {message}"))
}

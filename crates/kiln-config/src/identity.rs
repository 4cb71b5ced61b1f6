//! Client identity strings used to tag writes and watch subscriptions.

/// Builds a stable identity string for this process, combining the local
/// hostname with the process id so that concurrent clients on the same
/// machine (e.g. two `kiln` invocations) remain distinguishable.
///
/// Falls back to `"unknown-host"` if the hostname cannot be determined,
/// rather than failing identity resolution outright.
pub fn client_identity(label: &str) -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    format!("{label}@{host}:{}", std::process::id())
}

use url::Url;

use crate::error::{DriverError, DriverResult};

/// Path suffix of the RPC endpoint.
pub const RPC_PATH: &str = "/rpc";

/// Turn an `http(s)://host[:port][/path]` endpoint into the `ws(s)://.../rpc`
/// address the transport dials.
pub fn normalize_endpoint(raw: &str) -> DriverResult<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DriverError::InvalidUrl("Url is empty or not passed".to_string()));
    }

    let lower = raw.to_ascii_lowercase();
    let (scheme, rest) = if lower.starts_with("http://") {
        ("ws", &raw["http://".len()..])
    } else if lower.starts_with("https://") {
        ("wss", &raw["https://".len()..])
    } else {
        return Err(DriverError::InvalidUrl(format!(
            "Invalid protocol in '{}', expected http or https",
            raw
        )));
    };
    if rest.is_empty() || rest.starts_with('/') {
        return Err(DriverError::InvalidUrl(format!("Missing host in '{}'", raw)));
    }

    let mut endpoint = format!("{}://{}", scheme, rest.trim_end_matches('/'));
    if !endpoint.ends_with(RPC_PATH) {
        endpoint.push_str(RPC_PATH);
    }

    let parsed = Url::parse(&endpoint)
        .map_err(|e| DriverError::InvalidUrl(format!("{}: {}", raw, e)))?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(DriverError::InvalidUrl(format!("Missing host in '{}'", raw)));
    }

    Ok(endpoint)
}

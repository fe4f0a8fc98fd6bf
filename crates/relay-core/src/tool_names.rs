// Tool name encoding between canonical and LLM API formats
//
// All providers share the same encoding:
//   canonical:  server.tool       (dot-separated, caller side)
//   api:        server__tool      (double-underscore, provider side)
//
// Segments (the parts between dots) must not contain '__' themselves, or
// the round-trip would be lossy.

use crate::error::ProviderFailure;

/// Convert canonical `server.tool` to `server__tool` for LLM APIs.
///
/// Fails with *invalid_request* if any segment contains `__`, which would
/// make the round-trip lossy.
pub fn tool_name_to_api(name: &str) -> Result<String, ProviderFailure> {
    for segment in name.split('.') {
        if segment.contains("__") {
            return Err(ProviderFailure::invalid_request(format!(
                "tool name segment '{segment}' in '{name}' contains '__' which conflicts \
                 with the dot separator encoding. Rename the tool to avoid double underscores."
            )));
        }
    }
    Ok(name.replace('.', "__"))
}

/// Convert `server__tool` back to canonical `server.tool`.
pub fn tool_name_from_api(name: &str) -> String {
    name.replace("__", ".")
}

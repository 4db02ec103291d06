//! Input validation for values that end up in remote commands.

use crate::service::GatewayError;

/// Accept absolute paths built from a restrictive character allowlist.
///
/// The allowlist (alphanumeric, `/`, `-`, `_`, `.`, space) closes the
/// primary injection vector into the remote command channel: anything a
/// shell could interpret is rejected before a remote call is made.
pub(crate) fn validate_workspace_path(path: &str) -> Result<(), GatewayError> {
    if !path.starts_with('/') {
        return Err(GatewayError::InvalidInput(
            "workspace path must be an absolute path (start with /)".to_string(),
        ));
    }

    let allowed =
        |c: char| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.' | ' ');
    if !path.chars().all(allowed) {
        return Err(GatewayError::InvalidInput(
            "workspace path contains invalid characters; only alphanumeric, /, -, _, ., and \
             spaces are allowed"
                .to_string(),
        ));
    }

    Ok(())
}

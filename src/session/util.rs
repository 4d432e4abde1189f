//! Path helpers for SSH credentials.

/// Expands a leading `~/` to the value of `HOME`.
///
/// Paths without the prefix, and all paths when `HOME` is unset, are returned
/// unchanged.
///
/// # Examples
///
/// ```
/// # use benchferry::session::expand_tilde;
/// let home = std::env::var("HOME").expect("HOME should be set");
/// assert_eq!(expand_tilde("~/.ssh/bench.pem"), format!("{home}/.ssh/bench.pem"));
/// assert_eq!(expand_tilde("/keys/bench.pem"), "/keys/bench.pem");
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

/// Returns the conventional public key path for a private key file.
///
/// ```
/// # use benchferry::session::public_key_path;
/// assert_eq!(public_key_path("/keys/bench.pem"), "/keys/bench.pem.pub");
/// ```
#[must_use]
pub fn public_key_path(identity_file: &str) -> String {
    format!("{}.pub", expand_tilde(identity_file))
}

//! Path and URI normalization shared by the editor-based readers

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static MNT_DRIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/mnt/([a-zA-Z])/(.*)$").expect("mount pattern"));

/// Backslashes to `/`, drop a leading `/` before a drive letter, lowercase the drive.
///
/// `C:\Users\code` becomes `c:/Users/code`, `/c:/path` becomes `c:/path`.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut path = path.replace('\\', "/");
    let bytes = path.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'/' && bytes[2] == b':' {
        path.remove(0);
    }
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        let drive = (bytes[0] as char).to_ascii_lowercase();
        path.replace_range(0..1, &drive.to_string());
    }
    path
}

/// Lenient percent decoding; malformed escapes are kept verbatim
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push(((hi << 4) | lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// `file:///c%3A/path` becomes `c:/path`; non-file strings are just decoded
pub fn decode_file_uri(uri: &str) -> String {
    if uri.is_empty() {
        return String::new();
    }
    let path = match uri.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("file://") => {
            let rest = &uri[7..];
            // authority ends at the first slash ("file://host/path" or "file:///path")
            let rest = match rest.find('/') {
                Some(idx) => &rest[idx..],
                None => rest,
            };
            percent_decode(rest)
        }
        _ => percent_decode(uri),
    };
    normalize_path(&path)
}

/// Split `vscode-remote://<type>+<name>/<path>` into its parts
pub fn parse_remote_uri(uri: &str) -> Option<(String, String, String)> {
    let rest = uri.strip_prefix("vscode-remote://")?;
    let slash = rest.find('/')?;
    let (authority, path) = rest.split_at(slash);
    let (kind, name) = authority.split_once('+')?;
    Some((kind.to_ascii_lowercase(), percent_decode(name), path.to_string()))
}

/// Map a remote workspace folder to a locally reachable path.
///
/// Only WSL remotes seen from Windows can be resolved. Anything else, or a
/// candidate that does not exist, returns the input unchanged.
pub fn resolve_remote_path(folder: &str) -> String {
    if !folder.starts_with("vscode-remote://") {
        return folder.to_string();
    }
    parse_remote_uri(folder)
        .filter(|(kind, _, _)| kind == "wsl")
        .and_then(|(_, distro, linux_path)| resolve_wsl_path(&distro, &linux_path))
        .unwrap_or_else(|| folder.to_string())
}

fn resolve_wsl_path(distro: &str, linux_path: &str) -> Option<String> {
    if !cfg!(windows) {
        return None;
    }
    let mut candidates = Vec::new();
    if let Some(caps) = MNT_DRIVE_RE.captures(linux_path) {
        candidates.push(format!("{}:/{}", caps[1].to_ascii_lowercase(), &caps[2]));
    }
    let windows_style = linux_path.replace('/', "\\");
    let mut capitalized = distro.to_ascii_lowercase();
    if let Some(first) = capitalized.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    candidates.push(format!("\\\\wsl.localhost\\{}{}", capitalized, windows_style));
    candidates.push(format!("\\\\wsl.localhost\\{}{}", distro.to_ascii_lowercase(), windows_style));

    candidates.into_iter().find(|c| Path::new(c).exists())
}

/// Key used to join workspaces across agents: posix separators, lowercase
pub fn folder_key(folder: &str) -> String {
    let trimmed = normalize_path(folder);
    let trimmed = trimmed.trim_end_matches('/');
    trimmed.to_lowercase()
}

/// Last component of a folder path, used as a display name
pub fn folder_name(folder: &str) -> String {
    normalize_path(folder)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

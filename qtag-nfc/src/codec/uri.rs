//! URI identifier code abbreviation for well-known URI records
//!
//! The first payload byte of a URI record selects a prefix from a fixed
//! table; the remaining bytes are the UTF-8 tail of the URI.

/// Prefix table indexed by identifier code (0x00..=0x23)
const PREFIXES: [&str; 36] = [
    "",
    "http://www.",
    "https://www.",
    "http://",
    "https://",
    "tel:",
    "mailto:",
    "ftp://anonymous:anonymous@",
    "ftp://ftp.",
    "ftps://",
    "sftp://",
    "smb://",
    "nfs://",
    "ftp://",
    "dav://",
    "news:",
    "telnet://",
    "imap:",
    "rtsp://",
    "urn:",
    "pop:",
    "sip:",
    "sips:",
    "tftp:",
    "btspp://",
    "btl2cap://",
    "btgoep://",
    "tcpobex://",
    "irdaobex://",
    "file://",
    "urn:epc:id:",
    "urn:epc:tag:",
    "urn:epc:pat:",
    "urn:epc:raw:",
    "urn:epc:",
    "urn:nfc:",
];

/// Split a URI into the longest matching identifier code and its tail
pub fn abbreviate(uri: &str) -> (u8, &str) {
    let mut best: (u8, &str) = (0, uri);
    let mut best_len = 0;

    for (code, prefix) in PREFIXES.iter().enumerate().skip(1) {
        if prefix.len() > best_len && uri.starts_with(prefix) {
            best = (code as u8, &uri[prefix.len()..]);
            best_len = prefix.len();
        }
    }

    best
}

/// Rebuild the full URI from an identifier code and tail
///
/// Returns `None` for reserved codes.
pub fn expand(code: u8, tail: &str) -> Option<String> {
    PREFIXES
        .get(code as usize)
        .map(|prefix| format!("{}{}", prefix, tail))
}

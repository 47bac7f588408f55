//! Wordlist parsing for brute-force searches.

/// Candidates tried when no wordlist is uploaded.
pub const FALLBACK_PASSWORDS: [&str; 4] = ["123456", "password", "admin", "p@ssw0rd"];

/// Split raw wordlist bytes into candidates.
///
/// Invalid UTF-8 is replaced rather than rejected, each line is trimmed, and
/// blank lines are skipped. Order and duplicates are preserved.
pub fn parse(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// The built-in fallback list as owned strings.
pub fn fallback() -> Vec<String> {
    FALLBACK_PASSWORDS.iter().map(|p| p.to_string()).collect()
}

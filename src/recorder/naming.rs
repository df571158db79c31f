//! Sequence naming
//!
//! Output files follow the two-photon convention `<base>A<NN><ext>`, e.g.
//! `exp1_A01.avi`, `exp1_A02.avi`, so video and imaging files pair up by name.
//! The next number is derived from what is already on disk, which keeps the
//! series monotonic across restarts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Marker between the base name and the counter
pub const SERIES_MARKER: char = 'A';

/// A resolved output name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceName {
    /// File name without extension, ending in `A<NN>`
    pub stem: String,
    /// Full output path
    pub path: PathBuf,
    /// Sequence number
    pub counter: u32,
}

/// Split a trailing `A<NN>` counter off a base name.
///
/// Returns the bare base and the embedded counter, if any.
pub fn split_counter(base: &str) -> (&str, Option<u32>) {
    let bytes = base.as_bytes();
    if bytes.len() >= 3 {
        let n = bytes.len();
        let digits = &bytes[n - 2..];
        if bytes[n - 3] == SERIES_MARKER as u8 && digits.iter().all(u8::is_ascii_digit) {
            let counter = base[n - 2..].parse().ok();
            return (&base[..n - 3], counter);
        }
    }
    (base, None)
}

/// Counter of `file_name` if it belongs to the `base` + `ext` series
fn series_counter(file_name: &str, base: &str, ext: &str) -> Option<u32> {
    let rest = file_name.strip_prefix(base)?;
    let rest = rest.strip_suffix(ext)?;
    let digits = rest.strip_prefix(SERIES_MARKER)?;
    if digits.len() < 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn normalize_extension(ext: &str) -> String {
    if ext.is_empty() || ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

/// Highest counter used by the series in `dir`, 0 when none
pub fn highest_counter(dir: &Path, base: &str, ext: &str) -> io::Result<u32> {
    let ext = normalize_extension(ext);
    let mut highest = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(counter) = series_counter(name, base, &ext) {
            highest = highest.max(counter);
        }
    }
    Ok(highest)
}

/// Resolve the next unused name for `base` in `dir`.
///
/// Creates `dir` if needed. If `base` already ends in `A<NN>`, numbering
/// continues after the larger of that counter and the highest one on disk.
/// Only the disk is inspected: calling twice without creating the file yields
/// the same name.
pub fn next_sequence_name(dir: &Path, base: &str, ext: &str) -> io::Result<SequenceName> {
    fs::create_dir_all(dir)?;

    let (bare, embedded) = split_counter(base);
    let ext = normalize_extension(ext);
    let on_disk = highest_counter(dir, bare, &ext)?;
    let counter = on_disk.max(embedded.unwrap_or(0)) + 1;

    let stem = format!("{bare}{SERIES_MARKER}{counter:02}");
    let path = dir.join(format!("{stem}{ext}"));

    tracing::debug!("Next sequence name in {:?}: {}", dir, stem);

    Ok(SequenceName { stem, path, counter })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_empty_dir_starts_at_one() {
        let dir = tempdir().unwrap();
        let name = next_sequence_name(dir.path(), "trial_", ".avi").unwrap();
        assert_eq!(name.stem, "trial_A01");
        assert_eq!(name.path, dir.path().join("trial_A01.avi"));
        assert_eq!(name.counter, 1);
    }

    #[test]
    fn test_repeated_call_without_file_is_idempotent() {
        let dir = tempdir().unwrap();
        let first = next_sequence_name(dir.path(), "trial_", ".avi").unwrap();
        let second = next_sequence_name(dir.path(), "trial_", ".avi").unwrap();
        assert_eq!(first, second);
        assert!(second.path.ends_with("trial_A01.avi"));
    }

    #[test]
    fn test_continues_after_existing_series() {
        let dir = tempdir().unwrap();
        for n in 1..=4 {
            touch(dir.path(), &format!("exp1_A{n:02}.avi"));
        }
        let name = next_sequence_name(dir.path(), "exp1_", "avi").unwrap();
        assert_eq!(name.stem, "exp1_A05");
    }

    #[test]
    fn test_gaps_use_highest() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "exp1_A02.avi");
        touch(dir.path(), "exp1_A07.avi");
        let name = next_sequence_name(dir.path(), "exp1_", ".avi").unwrap();
        assert_eq!(name.counter, 8);
    }

    #[test]
    fn test_ignores_other_series_and_extensions() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "exp2_A09.avi");
        touch(dir.path(), "exp1_A05.json");
        touch(dir.path(), "exp1_A5.avi");
        touch(dir.path(), "exp1_B03.avi");
        let name = next_sequence_name(dir.path(), "exp1_", ".avi").unwrap();
        assert_eq!(name.stem, "exp1_A01");
    }

    #[test]
    fn test_embedded_counter_above_disk() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "exp1_A02.avi");
        let name = next_sequence_name(dir.path(), "exp1_A05", ".avi").unwrap();
        assert_eq!(name.stem, "exp1_A06");
    }

    #[test]
    fn test_embedded_counter_below_disk() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "exp1_A08.avi");
        let name = next_sequence_name(dir.path(), "exp1_A03", ".avi").unwrap();
        assert_eq!(name.stem, "exp1_A09");
    }

    #[test]
    fn test_series_continues_past_99() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "s_A99.avi");
        let name = next_sequence_name(dir.path(), "s_", ".avi").unwrap();
        assert_eq!(name.stem, "s_A100");
        touch(dir.path(), "s_A100.avi");
        assert_eq!(next_sequence_name(dir.path(), "s_", ".avi").unwrap().counter, 101);
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("mouse1").join("day3");
        let name = next_sequence_name(&nested, "hr_", ".avi").unwrap();
        assert!(nested.is_dir());
        assert_eq!(name.stem, "hr_A01");
    }

    #[test]
    fn test_split_counter() {
        assert_eq!(split_counter("exp1_A07"), ("exp1_", Some(7)));
        assert_eq!(split_counter("exp1_"), ("exp1_", None));
        assert_eq!(split_counter("A12"), ("", Some(12)));
        assert_eq!(split_counter("exp1_B07"), ("exp1_B07", None));
    }
}

use crate::error::{Error, Result};
use crate::wire::WireRecord;
use brain_types::Session;
use std::collections::HashSet;
use std::path::Path;

/// Parse an append-only transcript file into a [`Session`] (§4.1).
///
/// Stream-friendly: a trailing line that fails to parse as a complete
/// record is discarded with a warning rather than failing the parse,
/// since writers may be mid-append. Any other malformed line is also
/// discarded with a warning — only header problems and duplicate ids
/// are fatal.
pub fn parse_session_file(path: &Path) -> Result<Session> {
    let text = std::fs::read_to_string(path)?;
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();

    let Some(first) = lines.first() else {
        return Err(Error::MissingHeader {
            file: path.to_path_buf(),
        });
    };

    let header: crate::wire::HeaderRecord = serde_json::from_str::<WireRecord>(first)
        .ok()
        .and_then(|record| match record {
            WireRecord::Header(h) => Some(h),
            _ => None,
        })
        .ok_or_else(|| Error::MissingHeader {
            file: path.to_path_buf(),
        })?;

    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();

    for (idx, line) in lines.iter().enumerate().skip(1) {
        let is_last = idx == lines.len() - 1;
        match serde_json::from_str::<WireRecord>(line) {
            Ok(record) => {
                if let Some(entry) = record.into_entry() {
                    if !seen_ids.insert(entry.id.as_str().to_string()) {
                        return Err(Error::DuplicateEntryId {
                            file: path.to_path_buf(),
                            id: entry.id.as_str().to_string(),
                        });
                    }
                    entries.push(entry);
                }
            }
            Err(err) => {
                if is_last {
                    log::warn!(
                        "discarding unparsable trailing record in {}: {}",
                        path.display(),
                        err
                    );
                } else {
                    log::warn!(
                        "discarding unparsable record in {} at line {}: {}",
                        path.display(),
                        idx + 1,
                        err
                    );
                }
            }
        }
    }

    Ok(Session::new(path.to_path_buf(), header.computer, entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn parses_a_linear_session() {
        let file = write_file(&[
            r#"{"kind":"header","id":"h0","ts":"2026-01-01T00:00:00Z","computer":"laptop"}"#,
            r#"{"kind":"message","id":"e1","parent_id":null,"ts":"2026-01-01T00:00:01Z","role":"user","text":"hi"}"#,
            r#"{"kind":"message","id":"e2","parent_id":"e1","ts":"2026-01-01T00:00:02Z","role":"assistant","text":"hello"}"#,
        ]);

        let session = parse_session_file(file.path()).unwrap();
        assert_eq!(session.len(), 2);
        assert_eq!(session.header_computer.as_deref(), Some("laptop"));
        assert_eq!(session.leaf().unwrap().as_str(), "e2");
    }

    #[test]
    fn missing_header_is_fatal() {
        let file = write_file(&[
            r#"{"kind":"message","id":"e1","parent_id":null,"ts":"2026-01-01T00:00:01Z"}"#,
        ]);
        let err = parse_session_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::MissingHeader { .. }));
    }

    #[test]
    fn duplicate_entry_id_is_fatal() {
        let file = write_file(&[
            r#"{"kind":"header","id":"h0","ts":"2026-01-01T00:00:00Z"}"#,
            r#"{"kind":"message","id":"e1","parent_id":null,"ts":"2026-01-01T00:00:01Z"}"#,
            r#"{"kind":"message","id":"e1","parent_id":null,"ts":"2026-01-01T00:00:02Z"}"#,
        ]);
        let err = parse_session_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::DuplicateEntryId { .. }));
    }

    #[test]
    fn tolerates_partial_trailing_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"kind":"header","id":"h0","ts":"2026-01-01T00:00:00Z"}}"#).unwrap();
        writeln!(
            file,
            r#"{{"kind":"message","id":"e1","parent_id":null,"ts":"2026-01-01T00:00:01Z"}}"#
        )
        .unwrap();
        write!(file, r#"{{"kind":"message","id":"e2","parent_i"#).unwrap();

        let session = parse_session_file(file.path()).unwrap();
        assert_eq!(session.len(), 1);
    }
}

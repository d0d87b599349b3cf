//! CSV mapping input: one `GitHub-Org-Name`/`Snyk-Org-Name` pair per row.
use crate::model::OrgMapping;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("could not read CSV file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV parse error in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Read the org mapping CSV. Row order is preserved; the match sequence
/// later mirrors it.
pub fn read_csv_file(path: &Path) -> Result<Vec<OrgMapping>, MappingError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| MappingError::Io {
        path: display.clone(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let mut rows = Vec::new();
    for record in reader.deserialize::<OrgMapping>() {
        let row = record.map_err(|source| MappingError::Parse {
            path: display.clone(),
            source,
        })?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn reads_rows_in_order() {
        let td = tempdir().unwrap();
        let p = td.path().join("mapping.csv");
        let mut f = std::fs::File::create(&p).unwrap();
        writeln!(f, "GitHub-Org-Name,Snyk-Org-Name").unwrap();
        writeln!(f, "acme,acme-sec").unwrap();
        writeln!(f, "globex,globex-sec").unwrap();
        drop(f);

        let rows = read_csv_file(&p).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].github_org_name, "acme");
        assert_eq!(rows[0].snyk_org_name, "acme-sec");
        assert_eq!(rows[1].github_org_name, "globex");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_csv_file(Path::new("/nonexistent/mapping.csv")).unwrap_err();
        assert!(matches!(err, MappingError::Io { .. }));
    }

    #[test]
    fn malformed_row_is_a_parse_error() {
        let td = tempdir().unwrap();
        let p = td.path().join("mapping.csv");
        std::fs::write(&p, "GitHub-Org-Name,Snyk-Org-Name\nonly-one-column\n").unwrap();
        let err = read_csv_file(&p).unwrap_err();
        assert!(matches!(err, MappingError::Parse { .. }));
    }
}

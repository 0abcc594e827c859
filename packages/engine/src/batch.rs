//! Batch loading
//!
//! A batch is a YAML or JSON document with the raw acts and amendment
//! clauses extracted from a set of amending acts:
//!
//! ```yaml
//! acts:
//!   - id: legge:1991;14
//!     enactment_date: 1991-02-10
//!     articles:
//!       - number: "2"
//!         paragraphs:
//!           - number: "1"
//!             text: Testo del comma 1.
//! clauses:
//!   - source_act_id: legge:2020;77
//!     source_article: "1"
//!     destination_text: "dopo l'articolo 2 è inserito il seguente: «Art. 2-bis ...»"
//!     effective_date: 2020-07-14
//!     target_act_id: legge:1991;14
//! ```

use std::fs;
use std::path::Path;

use crate::config;
use crate::error::{Result, VigenzaError};
use crate::types::Batch;

impl Batch {
    /// Parse a batch from a YAML string.
    ///
    /// JSON is a subset of YAML, so JSON documents are accepted as well.
    ///
    /// # Errors
    ///
    /// Returns `VigenzaError::LoadError` if the content exceeds
    /// [`config::MAX_BATCH_SIZE`] or holds more than
    /// [`config::MAX_BATCH_CLAUSES`] clauses, and `VigenzaError::YamlError` if
    /// the document does not parse.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        check_size(content.len())?;
        let batch: Batch = serde_yaml_ng::from_str(content)?;
        batch.check_limits()?;
        Ok(batch)
    }

    /// Parse a batch from a JSON string.
    ///
    /// # Errors
    ///
    /// As [`Batch::from_yaml_str`], with `VigenzaError::JsonError` for
    /// malformed documents.
    pub fn from_json_str(content: &str) -> Result<Self> {
        check_size(content.len())?;
        let batch: Batch = serde_json::from_str(content)?;
        batch.check_limits()?;
        Ok(batch)
    }

    /// Load a batch file; `.json` files are read as JSON, anything else as
    /// YAML.
    ///
    /// # Errors
    ///
    /// Returns `VigenzaError::LoadError` if the file cannot be read or is too
    /// large, plus the parse errors of the format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        tracing::debug!(path = %path_ref.display(), "Loading batch file");

        let file_size = fs::metadata(path_ref)
            .map_err(|_| VigenzaError::LoadError("Failed to read batch file".to_string()))?
            .len();
        check_size(usize::try_from(file_size).unwrap_or(usize::MAX))?;

        let content = fs::read_to_string(path_ref)
            .map_err(|_| VigenzaError::LoadError("Failed to read batch file".to_string()))?;

        let is_json = path_ref
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    fn check_limits(&self) -> Result<()> {
        if self.clauses.len() > config::MAX_BATCH_CLAUSES {
            tracing::warn!(
                clauses = self.clauses.len(),
                max = config::MAX_BATCH_CLAUSES,
                "Batch exceeds clause limit"
            );
            return Err(VigenzaError::LoadError(format!(
                "Batch holds {} clauses, maximum is {}",
                self.clauses.len(),
                config::MAX_BATCH_CLAUSES
            )));
        }
        Ok(())
    }
}

fn check_size(size: usize) -> Result<()> {
    if size > config::MAX_BATCH_SIZE {
        tracing::warn!(size, max = config::MAX_BATCH_SIZE, "Batch exceeds size limit");
        return Err(VigenzaError::LoadError(format!(
            "Batch exceeds maximum size limit ({} bytes)",
            config::MAX_BATCH_SIZE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BATCH_YAML: &str = r#"
acts:
  - id: legge:1991;14
    enactment_date: 1991-02-10
    articles:
      - number: "2"
        paragraphs:
          - number: "1"
            text: Testo del comma 1.
clauses:
  - source_act_id: legge:2020;77
    source_article: "1"
    destination_text: "dopo l'articolo 2 è inserito il seguente: «Art. 2-bis»"
    effective_date: 2020-07-14
    target_act_id: legge:1991;14
"#;

    #[test]
    fn test_from_yaml_str() {
        let batch = Batch::from_yaml_str(BATCH_YAML).unwrap();
        assert_eq!(batch.acts.len(), 1);
        assert_eq!(batch.clauses.len(), 1);
        assert_eq!(batch.clauses[0].target_act_id.as_deref(), Some("legge:1991;14"));
    }

    #[test]
    fn test_from_json_str() {
        let json = r#"{"clauses": [{"source_act_id": "legge:2020;77",
            "destination_text": "l'articolo 4 è abrogato", "effective_date": "2021-01-01"}]}"#;
        let batch = Batch::from_json_str(json).unwrap();
        assert!(batch.acts.is_empty());
        assert_eq!(batch.clauses[0].destination_text, "l'articolo 4 è abrogato");
    }

    #[test]
    fn test_oversized_content_rejected() {
        let content = "x".repeat(config::MAX_BATCH_SIZE + 1);
        let err = Batch::from_yaml_str(&content).unwrap_err();
        assert!(matches!(err, VigenzaError::LoadError(_)));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = Batch::from_yaml_str("acts: [ {id: ").unwrap_err();
        assert!(matches!(err, VigenzaError::YamlError(_)));
    }

    #[test]
    fn test_from_file_picks_format_by_extension() {
        let dir = std::env::temp_dir().join(format!("vigenza-batch-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let yaml_path = dir.join("batch.yaml");
        fs::File::create(&yaml_path)
            .unwrap()
            .write_all(BATCH_YAML.as_bytes())
            .unwrap();
        assert_eq!(Batch::from_file(&yaml_path).unwrap().acts.len(), 1);

        let json_path = dir.join("batch.json");
        fs::write(&json_path, r#"{"acts": [], "clauses": []}"#).unwrap();
        assert_eq!(Batch::from_file(&json_path).unwrap(), Batch::default());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file() {
        let err = Batch::from_file("/nonexistent/batch.yaml").unwrap_err();
        assert!(matches!(err, VigenzaError::LoadError(_)));
    }
}

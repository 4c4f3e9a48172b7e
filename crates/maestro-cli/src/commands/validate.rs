//! `maestro validate`: parse and validate spec files without running them.

use console::style;
use maestro_core::spec::parse_documents;
use maestro_core::{SpecDocument, SpecError};

/// Per-document results for one file. A read failure is a single error.
pub fn check_file(path: &str) -> Vec<Result<SpecDocument, SpecError>> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_documents(&text),
        Err(e) => vec![Err(SpecError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })],
    }
}

pub async fn validate(files: &[String]) -> Result<(), String> {
    let mut valid = 0;
    let mut invalid = 0;

    for file in files {
        let results = check_file(file);
        if results.is_empty() {
            println!("{} {}: no documents", style("✗").red().bold(), file);
            invalid += 1;
        }
        for result in results {
            match result {
                Ok(doc) => {
                    valid += 1;
                    println!("{} {}: {}", style("✓").green().bold(), file, doc.key());
                }
                Err(e) => {
                    invalid += 1;
                    println!("{} {}: {}", style("✗").red().bold(), file, e);
                }
            }
        }
    }

    if invalid > 0 {
        Err(format!("{} invalid document(s), {} valid", invalid, valid))
    } else {
        Ok(())
    }
}

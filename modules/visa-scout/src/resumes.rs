use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use visa_scout_common::Resume;

const RESUME_EXTENSIONS: &[&str] = &["txt", "md", "pdf"];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

/// Extract text from a PDF with `pdftotext <file> -`.
async fn pdf_text(pdftotext_bin: &str, path: &Path) -> Result<String> {
    let output = tokio::process::Command::new(pdftotext_bin)
        .arg("-layout")
        .arg(path)
        .arg("-")
        .output()
        .await
        .with_context(|| format!("Failed to run {pdftotext_bin}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{pdftotext_bin} exited with {}: {}", output.status, stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

async fn read_resume(path: &Path, pdftotext_bin: &str) -> Result<String> {
    match extension(path).as_deref() {
        Some("pdf") => pdf_text(pdftotext_bin, path).await,
        _ => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

/// Load `.txt`, `.md` and `.pdf` resumes from `dir`, ordered by file name.
///
/// The order is the tie-break order for best-match selection. Unreadable or empty files
/// are skipped.
pub async fn load_resumes(dir: &Path, pdftotext_bin: &str) -> Result<Vec<Resume>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Cannot read resume directory {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let wanted = extension(&path).is_some_and(|e| RESUME_EXTENSIONS.contains(&e.as_str()));
        if wanted && entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut resumes = Vec::with_capacity(paths.len());
    for path in paths {
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match read_resume(&path, pdftotext_bin).await {
            Ok(text) if !text.trim().is_empty() => {
                info!(resume = %id, chars = text.chars().count(), "Loaded resume");
                resumes.push(Resume { id, text });
            }
            Ok(_) => warn!(resume = %id, "Skipping empty resume"),
            Err(e) => warn!(resume = %id, error = %e, "Skipping unreadable resume"),
        }
    }

    if resumes.is_empty() {
        warn!(dir = %dir.display(), "No resumes found");
    }
    Ok(resumes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_text_resumes_in_file_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_resume.md"), "# Bob\nPlaywright").unwrap();
        std::fs::write(dir.path().join("a_resume.txt"), "Alice: Selenium, Python").unwrap();
        std::fs::write(dir.path().join("empty.txt"), "   \n").unwrap();
        std::fs::write(dir.path().join("notes.docx"), "ignored").unwrap();

        let resumes = load_resumes(dir.path(), "pdftotext").await.unwrap();
        let ids: Vec<&str> = resumes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a_resume.txt", "b_resume.md"]);
        assert!(resumes[0].text.contains("Selenium"));
    }

    #[tokio::test]
    async fn pdf_extraction_failure_skips_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cv.pdf"), "not really a pdf").unwrap();
        std::fs::write(dir.path().join("cv.txt"), "QA engineer").unwrap();

        let resumes = load_resumes(dir.path(), "/nonexistent/pdftotext").await.unwrap();
        assert_eq!(resumes.len(), 1);
        assert_eq!(resumes[0].id, "cv.txt");
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        assert!(load_resumes(Path::new("/nonexistent/resumes"), "pdftotext")
            .await
            .is_err());
    }
}

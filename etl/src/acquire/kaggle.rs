use common::config::DatasetConfig;
use common::{Error, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Fetches the raw CSV exports through the Kaggle CLI.
pub struct KaggleDownloader {
    config: DatasetConfig,
}

impl KaggleDownloader {
    pub fn new(config: DatasetConfig) -> Self {
        Self { config }
    }

    async fn cli_available(&self) -> bool {
        let status = Command::new(&self.config.kaggle_bin)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        let available = status.map(|s| s.success()).unwrap_or(false);
        debug!(command = %self.config.kaggle_bin, available, "Kaggle CLI check");
        available
    }

    async fn install_cli(&self) -> Result<()> {
        info!("Installing Kaggle CLI");
        let output = Command::new("pip")
            .args(["install", "kaggle"])
            .output()
            .await
            .map_err(|e| Error::Download(format!("Failed to run pip: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Download(format!(
                "pip install kaggle failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    pub async fn ensure_cli(&self) -> Result<()> {
        if self.cli_available().await {
            return Ok(());
        }
        if !self.config.install_cli {
            return Err(Error::Download(format!(
                "Kaggle CLI `{}` not found; install it or set dataset.install_cli",
                self.config.kaggle_bin
            )));
        }

        self.install_cli().await?;
        if self.cli_available().await {
            Ok(())
        } else {
            Err(Error::Download(
                "Kaggle CLI still unavailable after installation".to_string(),
            ))
        }
    }

    /// Downloads the dataset archive and extracts it into the artifacts
    /// directory. Returns the extracted file paths.
    pub async fn download(&self) -> Result<Vec<PathBuf>> {
        self.ensure_cli().await?;

        let staging = tempfile::tempdir()?;
        let slug = self.config.slug();
        info!(dataset = %slug, "Downloading dataset");

        let output = Command::new(&self.config.kaggle_bin)
            .args(["datasets", "download", "-d", &slug, "-p"])
            .arg(staging.path())
            .output()
            .await
            .map_err(|e| Error::Download(format!("Failed to run Kaggle CLI: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Download(format!(
                "Download of {} failed: {}",
                slug,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let archives = find_archives(staging.path())?;
        if archives.is_empty() {
            return Err(Error::Download(format!(
                "Kaggle CLI produced no archive for {}",
                slug
            )));
        }

        let target = PathBuf::from(&self.config.artifacts_dir);
        let mut extracted = Vec::new();
        for archive in archives {
            let target = target.clone();
            let files =
                tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>> {
                    let files = extract_archive(&archive, &target)?;
                    fs::remove_file(&archive)?;
                    Ok(files)
                })
                .await??;
            extracted.extend(files);
        }

        for expected in [self.config.tracks_path(), self.config.artists_path()] {
            if !expected.exists() {
                warn!(path = %expected.display(), "Expected file missing from archive");
            }
        }

        info!(
            dataset = %slug,
            files = extracted.len(),
            dir = %target.display(),
            "Dataset extracted"
        );
        Ok(extracted)
    }
}

fn find_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("zip")) {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}

/// Extracts every file of a zip archive below `target`. Entries whose path
/// would escape `target` are skipped.
pub fn extract_archive(archive: &Path, target: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(target)?;
    let mut zip = zip::ZipArchive::new(File::open(archive)?)?;
    let mut extracted = Vec::new();

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };
        let path = target.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&path)?;
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&path)?;
        io::copy(&mut entry, &mut out)?;
        debug!(path = %path.display(), bytes = entry.size(), "Extracted file");
        extracted.push(path);
    }

    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, contents) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extract_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("dataset.zip");
        write_archive(
            &archive,
            &[
                ("tracks.csv", "id,name\n1,Song\n"),
                ("artists.csv", "id,followers\nA,10\n"),
            ],
        );

        let target = dir.path().join("out");
        let files = extract_archive(&archive, &target).unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(
            fs::read_to_string(target.join("tracks.csv")).unwrap(),
            "id,name\n1,Song\n"
        );
        assert!(target.join("artists.csv").exists());
    }

    #[test]
    fn test_corrupt_archive_is_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"not a zip").unwrap();

        let err = extract_archive(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, Error::Archive(_)));
    }

    #[test]
    fn test_find_archives_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.zip"), b"").unwrap();
        fs::write(dir.path().join("a.ZIP"), b"").unwrap();
        fs::write(dir.path().join("readme.txt"), b"").unwrap();

        let found = find_archives(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.ZIP", "b.zip"]);
    }

    #[tokio::test]
    async fn test_missing_cli_without_install_fails() {
        let downloader = KaggleDownloader::new(DatasetConfig {
            owner: "owner".to_string(),
            name: "name".to_string(),
            artifacts_dir: "artifacts".to_string(),
            tracks_file: "tracks.csv".to_string(),
            artists_file: "artists.csv".to_string(),
            kaggle_bin: "definitely-not-a-kaggle-binary".to_string(),
            install_cli: false,
        });

        let err = downloader.ensure_cli().await.unwrap_err();
        assert!(matches!(err, Error::Download(_)));
    }
}

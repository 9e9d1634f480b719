//! Zip container access: enumerating and extracting source token files and
//! packing trained model files into the result archive.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{IntervecError, Result};

/// Read-only source archive of token files.
///
/// Member names are reported in the archive's listing order; the pipeline
/// processes them in exactly that order without re-sorting.
pub struct SourceArchive {
    inner: ZipArchive<BufReader<File>>,
    path: PathBuf,
}

impl SourceArchive {
    /// Opens an existing archive read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|err| IntervecError::io(err, Some(path.clone())))?;
        let inner = ZipArchive::new(BufReader::new(file))?;
        Ok(Self { inner, path })
    }

    /// Number of member files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` when the archive holds no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Member names in listing order.
    pub fn names(&mut self) -> Result<Vec<String>> {
        (0..self.inner.len())
            .map(|idx| Ok(self.inner.by_index(idx)?.name().to_owned()))
            .collect()
    }

    /// Extracts one member into `dir`, flattening any directory components of
    /// the member name, and returns the staged path.
    pub fn extract(&mut self, name: &str, dir: &Path) -> Result<PathBuf> {
        let mut member = self.inner.by_name(name)?;
        let base = basename(name);
        if base.is_empty() {
            return Err(IntervecError::Archive(format!(
                "member {name:?} in {:?} has no usable file name",
                self.path
            )));
        }
        let staged = dir.join(base);
        let mut out = File::create(&staged)
            .map_err(|err| IntervecError::io(err, Some(staged.clone())))?;
        io::copy(&mut member, &mut out)
            .map_err(|err| IntervecError::io(err, Some(staged.clone())))?;
        Ok(staged)
    }
}

/// Write-once destination archive for model files.
pub struct ResultArchive {
    inner: ZipWriter<BufWriter<File>>,
    path: PathBuf,
}

impl ResultArchive {
    /// Creates (or truncates) the destination archive.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|err| IntervecError::io(err, Some(path.clone())))?;
        Ok(Self {
            inner: ZipWriter::new(BufWriter::new(file)),
            path,
        })
    }

    /// Streams one staged file into the archive under `member_name`.
    pub fn add_file(&mut self, staged: &Path, member_name: &str) -> Result<()> {
        self.inner
            .start_file(member_name, SimpleFileOptions::default())?;
        let mut reader = File::open(staged)
            .map_err(|err| IntervecError::io(err, Some(staged.to_path_buf())))?;
        io::copy(&mut reader, &mut self.inner)
            .map_err(|err| IntervecError::io(err, Some(self.path.clone())))?;
        Ok(())
    }

    /// Finalises the container, flushing the central directory.
    pub fn finish(self) -> Result<()> {
        let mut writer = self.inner.finish()?;
        writer
            .flush()
            .map_err(|err| IntervecError::io(err, Some(self.path)))?;
        Ok(())
    }
}

/// Final path component of an archive member name.
fn basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn build_archive(path: &Path, members: &[(&str, &str)]) {
        let file = File::create(path).expect("create archive");
        let mut writer = ZipWriter::new(file);
        for (name, content) in members {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("start member");
            writer.write_all(content.as_bytes()).expect("write member");
        }
        writer.finish().expect("finish archive");
    }

    #[test]
    fn names_preserve_listing_order() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("source.zip");
        build_archive(&path, &[("2020-09.json", "x"), ("2020-08.json", "y")]);

        let mut archive = SourceArchive::open(&path).expect("open");
        assert_eq!(
            archive.names().expect("names"),
            vec!["2020-09.json", "2020-08.json"]
        );
    }

    #[test]
    fn extract_flattens_member_paths() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("source.zip");
        build_archive(&path, &[("nested/dir/2020-08.json", "payload")]);

        let mut archive = SourceArchive::open(&path).expect("open");
        let staged = archive
            .extract("nested/dir/2020-08.json", dir.path())
            .expect("extract");
        assert_eq!(staged.file_name().unwrap(), "2020-08.json");
        assert_eq!(fs::read_to_string(&staged).unwrap(), "payload");
    }

    #[test]
    fn result_archive_round_trips_members() {
        let dir = tempdir().expect("tempdir");
        let staged = dir.path().join("2020-08.model");
        fs::write(&staged, "{\"vocab\":[]}").expect("write staged");

        let out = dir.path().join("result.zip");
        let mut result = ResultArchive::create(&out).expect("create");
        result.add_file(&staged, "2020-08.model").expect("add");
        result.finish().expect("finish");

        let mut archive = SourceArchive::open(&out).expect("reopen");
        assert_eq!(archive.names().expect("names"), vec!["2020-08.model"]);
    }

    #[test]
    fn empty_archive_reports_empty() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("empty.zip");
        build_archive(&path, &[]);
        let archive = SourceArchive::open(&path).expect("open");
        assert!(archive.is_empty());
        assert_eq!(archive.len(), 0);
    }
}

//! Filesystem collaborator: opening named streams and listing directory
//! entries for include resolution.

use std::{
    fs,
    io::{self, Read},
    path::Path,
};

pub trait Vfs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>>;
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<String>>;
}

/// The real filesystem.
pub struct OsVfs;

impl Vfs for OsVfs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        Ok(Box::new(fs::File::open(path)?))
    }

    fn list_dir(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }
}

/// In-memory filesystem keyed by normalized path strings.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemVfs {
    files: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl MemVfs {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            files: entries
                .iter()
                .map(|(path, text)| ((*path).to_owned(), (*text).to_owned()))
                .collect(),
        }
    }
}

#[cfg(test)]
impl Vfs for MemVfs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        let key = path.display().to_string();
        match self.files.get(&key) {
            Some(text) => Ok(Box::new(io::Cursor::new(text.clone().into_bytes()))),
            None => Err(io::Error::new(io::ErrorKind::NotFound, key)),
        }
    }

    fn list_dir(&self, dir: &Path) -> io::Result<Vec<String>> {
        let prefix = format!("{}/", dir.display());
        Ok(self
            .files
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .map(|rest| {
                // report only the entry name, as a directory listing would
                rest.rsplit('/').next().unwrap_or(rest).to_owned()
            })
            .collect())
    }
}

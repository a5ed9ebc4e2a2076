use std::{
    fs,
    path::{Path, PathBuf},
};

pub mod error {
    use std::{io, path::PathBuf};

    pub type Result<T> = std::result::Result<T, self::Error>;

    type Msg = &'static str;

    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error("{0} ({1}): {2}")]
        SingleIO(Msg, PathBuf, #[source] io::Error),

        #[error("File already exists: {0}")]
        AlreadyExists(PathBuf),

        #[error("Cannot find '{0}' in '{1}' or any of its ancestors")]
        NotFoundInAncestors(String, PathBuf),
    }
}
pub use error::{Error, Result};

#[must_use]
pub fn mkdir_all(path: impl AsRef<Path>) -> Result<()> {
    let dir = path.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::SingleIO("Cannot create dir", dir.to_owned(), e))
}

#[must_use]
pub fn write<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    fs::write(&filepath, contents)
        .map_err(|e| Error::SingleIO("Cannot write file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn write_with_mkdir<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    if let Some(dir) = filepath.as_ref().parent() {
        if !dir.as_os_str().is_empty() {
            self::mkdir_all(dir)?;
        }
    }
    self::write(filepath, contents)
}

/// Like [`write_with_mkdir`], but refuses to overwrite an existing file.
#[must_use]
pub fn write_new_with_mkdir<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    let path = filepath.as_ref();
    if path.exists() {
        return Err(Error::AlreadyExists(path.to_owned()));
    }
    self::write_with_mkdir(path, contents)
}

#[must_use]
pub fn read_to_string(filepath: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

/// Find `filename` in `start_dir` or the nearest ancestor dir containing it.
pub fn find_file_in_ancestors(start_dir: impl AsRef<Path>, filename: &str) -> Result<PathBuf> {
    let start_dir = start_dir.as_ref();
    let found = start_dir
        .ancestors()
        .map(|dir| dir.join(filename))
        .find(|path| path.is_file());
    match found {
        Some(path) => {
            log::debug!("Found {} at {}", filename, path.to_string_lossy());
            Ok(path)
        }
        None => Err(Error::NotFoundInAncestors(
            filename.to_owned(),
            start_dir.to_owned(),
        )),
    }
}

/// Normalize the path
/// ```
/// use fsutil::normalize_path;
/// use std::path::Path;
///
/// assert_eq!(normalize_path("./hoge/.config/././foo"), Path::new("hoge/.config/foo"));
/// assert_eq!(normalize_path("hoge/.config/../../bar/."), Path::new("bar"));
/// assert_eq!(normalize_path("../foo/../hello"), Path::new("../hello"));
/// assert_eq!(normalize_path("/"), Path::new("/"));
/// assert_eq!(normalize_path("./foo/"), Path::new("foo"));
/// assert_eq!(normalize_path("."), Path::new("."));
/// ```
pub fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    use ::std::path::Component;
    let components = path.as_ref().components();
    let mut stack = Vec::with_capacity(components.size_hint().1.unwrap_or(4));
    for c in components {
        match c {
            Component::CurDir => (),
            Component::ParentDir
                if matches!(stack.last(), Some(Component::Normal(_))) =>
            {
                stack.pop();
            }
            _ => {
                stack.push(c);
            }
        }
    }
    if stack.is_empty() {
        stack.push(Component::CurDir);
    }
    stack.iter().collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn read_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.rb");
        let err = read_to_string(&path).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Cannot read file"), "{}", msg);
        assert!(msg.contains("nope.rb"), "{}", msg);
    }

    #[test]
    fn write_new_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.toml");
        write_new_with_mkdir(&path, "x = 1").unwrap();
        assert_eq!(read_to_string(&path).unwrap(), "x = 1");
        assert!(matches!(
            write_new_with_mkdir(&path, "x = 2"),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn find_file_in_ancestors_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        write_with_mkdir(dir.path().join("conf.toml"), "").unwrap();
        let nested = dir.path().join("x/y/z");
        mkdir_all(&nested).unwrap();

        let found = find_file_in_ancestors(&nested, "conf.toml").unwrap();
        assert_eq!(found, dir.path().join("conf.toml"));

        assert!(matches!(
            find_file_in_ancestors(&nested, "missing.toml"),
            Err(Error::NotFoundInAncestors(..))
        ));
    }
}

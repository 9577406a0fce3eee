// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Source loading.

use std::io;
use url::Url;

/// Fetches the bytes behind a canonical location.
///
/// Loaders do not need to cache; the resolver calls them at most once per
/// location.
pub trait Loader: Send + Sync {
    /// Loads `location`. `specifier` is the text that was written in the
    /// importing module, for diagnostics.
    fn load(&self, location: &Url, specifier: &str) -> io::Result<Vec<u8>>;
}

impl<F> Loader for F
where
    F: Fn(&Url, &str) -> io::Result<Vec<u8>> + Send + Sync,
{
    fn load(&self, location: &Url, specifier: &str) -> io::Result<Vec<u8>> {
        self(location, specifier)
    }
}

/// Loads `file:` locations from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl Loader for FsLoader {
    fn load(&self, location: &Url, specifier: &str) -> io::Result<Vec<u8>> {
        if location.scheme() != "file" {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("cannot load {} ({}): only file: URLs are supported", location, specifier),
            ));
        }
        let path = location.to_file_path().map_err(|()| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a local path", location),
            )
        })?;
        tracing::debug!("reading {}", path.display());
        std::fs::read(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_loader() {
        let loader = |location: &Url, _: &str| -> io::Result<Vec<u8>> {
            Ok(location.path().as_bytes().to_vec())
        };
        let url = Url::parse("file:///a/b.js").unwrap();
        assert_eq!(loader.load(&url, "./b.js").unwrap(), b"/a/b.js");
    }

    #[test]
    fn test_fs_loader_rejects_remote() {
        let url = Url::parse("https://example.com/a.js").unwrap();
        let err = FsLoader.load(&url, "https://example.com/a.js").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}

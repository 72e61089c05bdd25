//! SHA-256 verification against a release's `hashes.txt`

use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Digest listed for `artifact` in a `<hex>  <path>` manifest.
///
/// Paths may carry a build directory prefix; only the file name is compared.
pub fn expected_digest(manifest: &str, artifact: &str) -> Option<String> {
    manifest.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let digest = fields.next()?;
        let path = fields.next()?.trim_start_matches('*');
        let name = path.rsplit('/').next().unwrap_or(path);
        (name == artifact && digest.len() == 64).then(|| digest.to_ascii_lowercase())
    })
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const MANIFEST: &str = "\
1f9c6ae41c5d2c8e8e1fbc2c4b7e0c4d5a0f0f6e2b6bfe3bba1f6ba2d1c0ffee  build/hysteria-linux-arm64
e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855  build/hysteria-linux-amd64
";

    #[test]
    fn test_finds_entry_by_file_name() {
        assert_eq!(
            expected_digest(MANIFEST, "hysteria-linux-amd64").as_deref(),
            Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
        assert!(expected_digest(MANIFEST, "hysteria-linux-arm").is_none());
        assert!(expected_digest("", "hysteria-linux-amd64").is_none());
    }

    #[test]
    fn test_file_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, b"").unwrap();
        assert_eq!(
            file_sha256(&path).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

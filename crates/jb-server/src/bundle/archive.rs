//! ZIP assembly and integrity tags.

use std::io::{Cursor, Write};

use sha2::{Digest, Sha256};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{CachedBundle, DownloadedFile};

/// Hex characters of the SHA-256 kept in the ETag.
const ETAG_HEX_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("zip encoding failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("zip write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("assembly task aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

/// Pack files into an in-memory ZIP, one member per file in the given order.
pub fn assemble(files: &[DownloadedFile]) -> Result<Vec<u8>, AssemblyError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for file in files {
        writer.start_file(file.filename.as_str(), options)?;
        writer.write_all(&file.bytes)?;
    }

    Ok(writer.finish()?.into_inner())
}

/// Assemble on the blocking pool and wrap the result with its ETag.
pub async fn build_bundle(files: Vec<DownloadedFile>) -> Result<CachedBundle, AssemblyError> {
    tokio::task::spawn_blocking(move || -> Result<CachedBundle, AssemblyError> {
        let bytes = assemble(&files)?;
        tracing::debug!(members = files.len(), bytes = bytes.len(), "Archive assembled");
        Ok(CachedBundle::from_archive(bytes))
    })
    .await?
}

/// Quoted, truncated SHA-256 of the archive bytes.
pub fn integrity_tag(bytes: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    format!("\"{}\"", &digest[..ETAG_HEX_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::read_members;
    use bytes::Bytes;

    fn file(name: &str, content: &[u8]) -> DownloadedFile {
        DownloadedFile {
            filename: name.to_string(),
            bytes: Bytes::copy_from_slice(content),
        }
    }

    #[test]
    fn test_members_in_given_order() {
        let bytes = assemble(&[file("z.jar", b"zzz"), file("a.jar", b"")]).unwrap();
        assert_eq!(
            read_members(&bytes),
            vec![
                ("z.jar".to_string(), b"zzz".to_vec()),
                ("a.jar".to_string(), Vec::new()),
            ]
        );
    }

    #[test]
    fn test_duplicate_member_names_fail() {
        let err = assemble(&[file("a.jar", b"1"), file("a.jar", b"2")]).unwrap_err();
        assert!(matches!(err, AssemblyError::Zip(_)));
    }

    #[test]
    fn test_integrity_tag_shape() {
        let tag = integrity_tag(b"archive");
        assert_eq!(tag.len(), ETAG_HEX_LEN + 2);
        assert!(tag.starts_with('"') && tag.ends_with('"'));
        assert_eq!(tag, integrity_tag(b"archive"));
        assert_ne!(tag, integrity_tag(b"archive2"));
    }

    #[tokio::test]
    async fn test_build_bundle_tags_archive_bytes() {
        let bundle = build_bundle(vec![file("a.jar", &[7u8; 4096])]).await.unwrap();
        assert_eq!(bundle.etag, integrity_tag(&bundle.bytes));
        assert_eq!(read_members(&bundle.bytes)[0].1, vec![7u8; 4096]);
    }
}

use std::io::Read;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::AssistantError;

/// Every upload is labelled as JPEG regardless of its real format.
pub const IMAGE_MEDIA_TYPE: &str = "image/jpeg";

pub fn encode_image(raw: &[u8]) -> Result<String, AssistantError> {
    if raw.is_empty() {
        return Err(AssistantError::Codec("upload is empty".to_string()));
    }
    Ok(STANDARD.encode(raw))
}

pub fn encode_reader<R: Read>(mut reader: R) -> Result<String, AssistantError> {
    let mut raw = Vec::new();
    reader
        .read_to_end(&mut raw)
        .map_err(|e| AssistantError::Codec(e.to_string()))?;
    encode_image(&raw)
}

pub fn encode_file(path: &Path) -> Result<String, AssistantError> {
    let file = std::fs::File::open(path)
        .map_err(|e| AssistantError::Codec(format!("{}: {}", path.display(), e)))?;
    encode_reader(file)
}

pub fn data_uri(encoded: &str) -> String {
    format!("data:{};base64,{}", IMAGE_MEDIA_TYPE, encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};

    struct BrokenUpload;

    impl Read for BrokenUpload {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "upload truncated"))
        }
    }

    #[test]
    fn test_encode_png_header() {
        let png_magic = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(encode_image(&png_magic).unwrap(), "iVBORw0KGgo=");
    }

    #[test]
    fn test_empty_upload_is_rejected() {
        assert!(matches!(encode_image(&[]), Err(AssistantError::Codec(_))));
    }

    #[test]
    fn test_unreadable_upload_is_rejected() {
        let err = encode_reader(BrokenUpload).unwrap_err();
        assert!(matches!(err, AssistantError::Codec(ref msg) if msg.contains("truncated")));
    }

    #[test]
    fn test_data_uri_assumes_jpeg() {
        assert_eq!(data_uri("AAAA"), "data:image/jpeg;base64,AAAA");
    }

    #[test]
    fn test_encode_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xFF, 0xD8, 0xFF]).unwrap();
        file.flush().unwrap();
        assert_eq!(encode_file(file.path()).unwrap(), "/9j/");
    }

    #[test]
    fn test_missing_file_is_codec_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("plan.jpg");
        assert!(matches!(encode_file(&missing), Err(AssistantError::Codec(_))));
    }
}

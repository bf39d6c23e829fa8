use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::diagnosis::SubmitError;

/// Uploads above 10MB are refused before anything is sent
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// A photo attached to a diagnosis, already checked against [MAX_IMAGE_BYTES]
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    bytes: Vec<u8>,
    mime_type: String,
}

impl std::fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageUpload")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

fn check_size(size: usize) -> Result<(), SubmitError> {
    if size > MAX_IMAGE_BYTES {
        Err(SubmitError::ImageTooLarge { size })
    } else {
        Ok(())
    }
}

impl ImageUpload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Result<Self, SubmitError> {
        let mime_type = mime_type.into();
        if !mime_type.starts_with("image/") {
            return Err(SubmitError::NotAnImage(mime_type));
        }
        check_size(bytes.len())?;
        Ok(Self { bytes, mime_type })
    }

    /// Read an image from disk, the MIME type is guessed from the extension.
    /// The size is checked before the file is read.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SubmitError> {
        let path = path.as_ref();
        let unreadable = |why: std::io::Error| SubmitError::Unreadable(format!("{path:?}: {why}"));

        let size = std::fs::metadata(path).map_err(unreadable)?.len();
        check_size(usize::try_from(size).unwrap_or(usize::MAX))?;

        let mime_type = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let bytes = std::fs::read(path).map_err(unreadable)?;
        Self::new(bytes, mime_type)
    }

    /// Decode standard base64 image data
    pub fn from_base64(mime_type: impl Into<String>, data: &str) -> Result<Self, SubmitError> {
        let data = data.trim();
        // Base64 is 4 chars per 3 bytes minus padding, don't bother decoding something that's too big
        let padding = data.bytes().rev().take_while(|b| *b == b'=').count();
        check_size((data.len() / 4 * 3).saturating_sub(padding))?;
        let bytes = STANDARD
            .decode(data)
            .map_err(|why| SubmitError::InvalidEncoding(why.to_string()))?;
        Self::new(bytes, mime_type)
    }

    /// Parse a `data:image/...;base64,...` URL as produced by a browser file reader
    pub fn from_data_url(url: &str) -> Result<Self, SubmitError> {
        let invalid = || SubmitError::InvalidEncoding("Not a base64 data URL".to_string());
        let rest = url.strip_prefix("data:").ok_or_else(invalid)?;
        let (meta, data) = rest.split_once(',').ok_or_else(invalid)?;
        let mime_type = meta.strip_suffix(";base64").ok_or_else(invalid)?;
        Self::from_base64(mime_type, data)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Transfer-safe encoding of the image bytes
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

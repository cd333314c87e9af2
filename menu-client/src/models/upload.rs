use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::services::preview::PreviewHandle;

/// A file the user picked, before it passes the upload policy.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFile {
    pub name: String,
    /// Declared MIME type, e.g. `image/jpeg`.
    pub media_type: String,
    pub data: Bytes,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// A candidate accepted into the session, paired with its preview handle.
///
/// The handle lives inside the file so the two can never drift apart.
#[derive(Debug)]
pub struct StagedFile {
    file: CandidateFile,
    preview: PreviewHandle,
}

impl StagedFile {
    pub(crate) fn new(file: CandidateFile, preview: PreviewHandle) -> Self {
        Self { file, preview }
    }

    pub fn name(&self) -> &str {
        &self.file.name
    }

    pub fn media_type(&self) -> &str {
        &self.file.media_type
    }

    pub fn size(&self) -> u64 {
        self.file.size()
    }

    pub fn data(&self) -> &Bytes {
        &self.file.data
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    pub(crate) fn into_parts(self) -> (CandidateFile, PreviewHandle) {
        (self.file, self.preview)
    }

    pub(crate) fn to_part(&self) -> FilePart {
        FilePart {
            file_name: self.file.name.clone(),
            media_type: self.file.media_type.clone(),
            data: self.file.data.clone(),
        }
    }
}

/// One binary payload of a multipart request.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub media_type: String,
    pub data: Bytes,
}

impl From<&CandidateFile> for FilePart {
    fn from(file: &CandidateFile) -> Self {
        Self {
            file_name: file.name.clone(),
            media_type: file.media_type.clone(),
            data: file.data.clone(),
        }
    }
}

/// A file accepted by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub path: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUploadResponse {
    pub images: Vec<UploadResult>,
}

use std::fs;
use std::path::Path;

const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "bmp", "gif", "webp", "tif", "tiff"];
const ARCHIVE_EXTENSIONS: [&str; 3] = ["zip", "rar", "7z"];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("no files selected")]
    NoFiles,
    #[error("images and archives cannot be uploaded together")]
    Mixed,
    #[error("only one archive can be uploaded at a time, got {0}")]
    MultipleArchives(usize),
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("reading {path} failed: {message}")]
    Io { path: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Archive,
}

/// A file selected for recognition, already read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|err| UploadError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    pub fn kind(&self) -> Option<UploadKind> {
        let extension = Path::new(&self.name)
            .extension()?
            .to_string_lossy()
            .to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Some(UploadKind::Image)
        } else if ARCHIVE_EXTENSIONS.contains(&extension.as_str()) {
            Some(UploadKind::Archive)
        } else {
            None
        }
    }
}

/// How a selection is sent to the detection service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPlan {
    Single(UploadFile),
    /// One `/detect/single` request per file, in selection order.
    Batch(Vec<UploadFile>),
    Archive(UploadFile),
}

impl UploadPlan {
    pub fn from_files(files: Vec<UploadFile>) -> Result<Self, UploadError> {
        if files.is_empty() {
            return Err(UploadError::NoFiles);
        }

        let mut images = 0;
        let mut archives = 0;
        for file in &files {
            match file.kind() {
                Some(UploadKind::Image) => images += 1,
                Some(UploadKind::Archive) => archives += 1,
                None => return Err(UploadError::Unsupported(file.name.clone())),
            }
        }
        if images > 0 && archives > 0 {
            return Err(UploadError::Mixed);
        }
        if archives > 1 {
            return Err(UploadError::MultipleArchives(archives));
        }

        let mut files = files;
        if archives == 1 {
            return Ok(UploadPlan::Archive(files.remove(0)));
        }
        if files.len() == 1 {
            Ok(UploadPlan::Single(files.remove(0)))
        } else {
            Ok(UploadPlan::Batch(files))
        }
    }
}

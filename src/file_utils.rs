// File utilities for Emotion API
//
// This module contains utility functions for file operations used in the Emotion API.
// It handles creating unique upload paths and removing temporary files, including
// guards that clean up when a request finishes on any path.

use log::{debug, error, info};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Paths of one uploaded file
#[derive(Debug, Clone)]
pub struct UploadPaths {
    /// Folder created for this upload
    pub folder: PathBuf,
    /// Full path of the uploaded file inside the folder
    pub audio_file: PathBuf,
    /// Unique upload ID
    pub id: String,
}

/// Generate a unique filename with UUID and create a subfolder for it
///
/// # Arguments
///
/// * `base_dir` - Base directory for temporary files
/// * `prefix` - Prefix for the filename
/// * `extension` - File extension, kept from the client's filename
///
/// # Errors
///
/// Returns an IO error if directory creation fails
pub fn generate_unique_upload_paths(
    base_dir: &Path,
    prefix: &str,
    extension: &str,
) -> io::Result<UploadPaths> {
    let id = Uuid::new_v4().to_string();
    let filename = if extension.is_empty() {
        format!("{}_{}", prefix, id)
    } else {
        format!("{}_{}.{}", prefix, id, extension)
    };

    let folder = base_dir.join(&id);
    fs::create_dir_all(&folder)?;

    let audio_file = folder.join(filename);

    Ok(UploadPaths {
        folder,
        audio_file,
        id,
    })
}

/// Save uploaded file data to the filesystem
pub fn save_file_data(data: &[u8], file_path: &Path) -> io::Result<()> {
    let mut file = File::create(file_path)?;
    file.write_all(data)?;
    Ok(())
}

/// Clean up a folder and its contents
///
/// This function logs errors but doesn't return them to the caller
pub fn cleanup_folder(folder_path: &Path) {
    if let Err(e) = fs::remove_dir_all(folder_path) {
        error!("Failed to clean up folder {}: {}", folder_path.display(), e);
    } else {
        info!("Successfully cleaned up folder: {}", folder_path.display());
    }
}

/// Removes an upload folder when dropped
#[derive(Debug)]
pub struct UploadGuard {
    paths: UploadPaths,
}

impl UploadGuard {
    pub fn new(paths: UploadPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &UploadPaths {
        &self.paths
    }

    pub fn audio_file(&self) -> &Path {
        &self.paths.audio_file
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if self.paths.folder.exists() {
            cleanup_folder(&self.paths.folder);
        }
    }
}

/// Removes a single temporary file when dropped
#[derive(Debug)]
pub struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed temporary file {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => error!(
                "Failed to remove temporary file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

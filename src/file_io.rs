use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

#[allow(unused_imports)]
use log::{debug, info, warn, error};

// Formats enabled on the image crate
const ALLOWED_EXTENSIONS: [&str; 12] = [
    "jpg", "jpeg", "png", "gif", "bmp", "ico", "tif", "tiff", "webp", "pnm", "qoi", "tga",
];

pub fn is_file(path: &Path) -> bool {
    fs::metadata(path).map(|metadata| metadata.is_file()).unwrap_or(false)
}

pub fn is_directory(path: &Path) -> bool {
    fs::metadata(path).map(|metadata| metadata.is_dir()).unwrap_or(false)
}

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|extension| ALLOWED_EXTENSIONS.contains(&extension.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image files directly inside `directory_path`, in natural order.
pub fn get_image_paths(directory_path: &Path) -> Vec<PathBuf> {
    let mut image_paths: Vec<PathBuf> = Vec::new();

    if let Ok(paths) = fs::read_dir(directory_path) {
        for entry in paths.flatten() {
            let path = entry.path();
            if has_image_extension(&path) && is_file(&path) {
                image_paths.push(path);
            }
        }
    }

    // Sort paths like Nautilus file viewer. `image_paths.sort()` does not work as expected
    alphanumeric_sort::sort_path_slice(&mut image_paths);
    image_paths
}

/// Expands directories and keeps explicit files in the order given.
pub fn collect_image_paths(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    for input in inputs {
        if is_directory(input) {
            let found = get_image_paths(input);
            debug!("Found {} images in {}", found.len(), input.display());
            paths.extend(found);
        } else if is_file(input) {
            paths.push(input.clone());
        } else {
            warn!("Skipping {}: not a file or directory", input.display());
        }
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_expansion_is_natural_sorted() {
        let dir = std::env::temp_dir().join(format!("atlas_batcher_inputs_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        for name in ["img10.png", "img2.PNG", "notes.txt", "img1.jpg"] {
            fs::write(dir.join(name), b"").unwrap();
        }

        let paths = collect_image_paths(&[dir.clone(), dir.join("missing.png")]);
        let names: Vec<&str> = paths
            .iter()
            .filter_map(|path| path.file_name().and_then(OsStr::to_str))
            .collect();

        assert_eq!(names, vec!["img1.jpg", "img2.PNG", "img10.png"]);
        let _ = fs::remove_dir_all(&dir);
    }
}

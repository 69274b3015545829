use image::imageops::FilterType;
use image::RgbImage;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SUPPORTED_EXT: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif", "bmp", "gif", "webp"];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXT.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// An ordered collection of decoded images, all at the same square
/// resolution with three channels. Files that fail to decode are dropped
/// and counted, never fatal.
pub struct ImageSet {
    pub images: Vec<RgbImage>,
    pub skipped: usize,
}

impl ImageSet {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

fn decode_and_resize(path: &Path, target: u32) -> Option<RgbImage> {
    match image::open(path) {
        Ok(img) => Some(
            img.resize_exact(target, target, FilterType::Lanczos3)
                .to_rgb8(),
        ),
        Err(err) => {
            log::warn!("Could not load image {}: {}", path.display(), err);
            None
        }
    }
}

fn collect_files(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    WalkDir::new(root)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_supported_image(e.path()))
        .map(|e| e.into_path())
        .collect()
}

fn load_from_paths(paths: Vec<PathBuf>, target: u32) -> ImageSet {
    let total = paths.len();
    let images: Vec<RgbImage> = paths
        .iter()
        .filter_map(|p| decode_and_resize(p, target))
        .collect();
    let skipped = total - images.len();
    if skipped > 0 {
        log::info!("Skipped {skipped} of {total} files that failed to decode");
    }
    ImageSet { images, skipped }
}

/// Pools every image under `root`, recursing one level into class
/// subdirectories. A missing root yields an empty set.
pub fn load_pooled(root: &Path, target: u32) -> ImageSet {
    if !root.is_dir() {
        log::warn!("Image directory not found: {}", root.display());
        return ImageSet {
            images: Vec::new(),
            skipped: 0,
        };
    }
    load_from_paths(collect_files(root, 2), target)
}

/// Loads only the direct children of a single class directory.
pub fn load_class(class_dir: &Path, target: u32) -> ImageSet {
    if !class_dir.is_dir() {
        return ImageSet {
            images: Vec::new(),
            skipped: 0,
        };
    }
    load_from_paths(collect_files(class_dir, 1), target)
}

/// Enumerates the immediate subdirectories of the real-images root.
/// No subdirectories means flat mode: the whole tree is one implicit
/// "root" class, resolved by `class_dir`.
pub fn discover_classes(real_root: &Path) -> Vec<String> {
    let mut classes: Vec<String> = match std::fs::read_dir(real_root) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(|s| s.to_string()))
            .collect(),
        Err(err) => {
            log::warn!(
                "Could not enumerate classes in {}: {}",
                real_root.display(),
                err
            );
            Vec::new()
        }
    };
    classes.sort();
    if classes.is_empty() {
        log::info!(
            "No class subdirectories under {}; treating the tree as a single \"root\" class",
            real_root.display()
        );
        vec![ROOT_CLASS.to_string()]
    } else {
        classes
    }
}

pub const ROOT_CLASS: &str = "root";

/// Maps a class name back to its directory. The implicit "root" class is
/// the root itself, but only when the root really has no subdirectories,
/// so a literal `root/` class directory still resolves normally.
pub fn class_dir(root: &Path, class_name: &str) -> PathBuf {
    let candidate = root.join(class_name);
    if class_name == ROOT_CLASS && !candidate.is_dir() {
        root.to_path_buf()
    } else {
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::fs;
    use std::path::PathBuf;

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "genmetrics-loader-{tag}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) {
        let img = RgbImage::from_pixel(w, h, image::Rgb([10, 20, 30]));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn missing_root_yields_empty_set() {
        let set = load_pooled(Path::new("/nonexistent/genmetrics-test"), 32);
        assert!(set.is_empty());
        assert_eq!(set.skipped, 0);
    }

    #[test]
    fn pooled_load_recurses_one_level_and_resizes() {
        let dir = unique_temp_dir("pooled");
        write_png(&dir, "a.png", 64, 48);
        let sub = dir.join("cats");
        fs::create_dir_all(&sub).unwrap();
        write_png(&sub, "b.png", 16, 16);

        let set = load_pooled(&dir, 32);
        assert_eq!(set.len(), 2);
        for img in &set.images {
            assert_eq!((img.width(), img.height()), (32, 32));
        }
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn bad_files_are_skipped_and_counted() {
        let dir = unique_temp_dir("bad");
        write_png(&dir, "good.png", 8, 8);
        fs::write(dir.join("broken.png"), b"not a png").unwrap();
        fs::write(dir.join("notes.txt"), b"ignored entirely").unwrap();

        let set = load_pooled(&dir, 16);
        assert_eq!(set.len(), 1);
        assert_eq!(set.skipped, 1);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn class_load_is_non_recursive() {
        let dir = unique_temp_dir("class");
        write_png(&dir, "top.png", 8, 8);
        let nested = dir.join("deeper");
        fs::create_dir_all(&nested).unwrap();
        write_png(&nested, "ignored.png", 8, 8);

        let set = load_class(&dir, 16);
        assert_eq!(set.len(), 1);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn class_discovery_falls_back_to_root() {
        let dir = unique_temp_dir("flat");
        write_png(&dir, "only.png", 8, 8);
        assert_eq!(discover_classes(&dir), vec![ROOT_CLASS.to_string()]);
        assert_eq!(class_dir(&dir, ROOT_CLASS), dir);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn class_discovery_lists_subdirectories_sorted() {
        let dir = unique_temp_dir("classes");
        fs::create_dir_all(dir.join("zebra")).unwrap();
        fs::create_dir_all(dir.join("ant")).unwrap();
        assert_eq!(discover_classes(&dir), vec!["ant", "zebra"]);
        assert_eq!(class_dir(&dir, "ant"), dir.join("ant"));
        fs::remove_dir_all(&dir).unwrap();
    }
}

// src/recipe/source.rs

//! Scoped access to a recipe on disk
//!
//! A recipe is either a directory holding `recipe.toml`, the `recipe.toml`
//! file itself, or a tarball carrying one (a built package keeps its recipe
//! under `info/recipe/`). Tarballs are unpacked into a temporary directory
//! owned by the [`RecipeSource`]; dropping the handle removes it, whether
//! rendering succeeded or not.

use crate::error::{Error, Result};
use crate::recipe::format::RecipeTemplate;
use crate::recipe::parser::parse_recipe_file;
use crate::variant::VariantTable;
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::Archive;
use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;
use xz2::read::XzDecoder;

/// Recipe file name inside a recipe directory
pub const RECIPE_FILE: &str = "recipe.toml";

/// Variant table shipped alongside a recipe
pub const VARIANT_FILE: &str = "variants.toml";

/// How deep to look for a recipe inside an unpacked archive
const MAX_RECIPE_DEPTH: usize = 3;

/// Compression wrapping a recipe tarball
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompressionFormat {
    Bzip2,
    Gzip,
    Xz,
    Zstd,
    None,
}

/// Archive extensions accepted as recipe sources, `.tar.bz2` first
const ARCHIVE_EXTENSIONS: &[(&str, CompressionFormat)] = &[
    (".tar.bz2", CompressionFormat::Bzip2),
    (".tar.gz", CompressionFormat::Gzip),
    (".tgz", CompressionFormat::Gzip),
    (".tar.xz", CompressionFormat::Xz),
    (".tar.zst", CompressionFormat::Zstd),
    (".tar", CompressionFormat::None),
];

fn detect_compression(path: &Path) -> Option<CompressionFormat> {
    let name = path.file_name()?.to_string_lossy().to_lowercase();
    ARCHIVE_EXTENSIONS
        .iter()
        .find(|(ext, _)| name.ends_with(ext))
        .map(|(_, format)| *format)
}

/// Whether a path names a recognized recipe archive
pub fn is_recipe_archive(path: &Path) -> bool {
    detect_compression(path).is_some()
}

/// An opened recipe, valid for as long as the handle lives
#[derive(Debug)]
pub struct RecipeSource {
    origin: PathBuf,
    recipe_dir: PathBuf,
    extracted: Option<TempDir>,
}

impl RecipeSource {
    /// Open a recipe directory, recipe file or recipe archive
    ///
    /// Fails with [`Error::RecipeNotFound`] when the path does not exist and
    /// [`Error::NotARecipe`] when it holds no recognizable recipe. Nothing
    /// is left behind on failure.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::RecipeNotFound(path.to_path_buf()));
        }

        if path.is_dir() {
            if !path.join(RECIPE_FILE).is_file() {
                return Err(Error::NotARecipe(path.to_path_buf()));
            }
            return Ok(Self {
                origin: path.to_path_buf(),
                recipe_dir: path.to_path_buf(),
                extracted: None,
            });
        }

        if path.file_name().is_some_and(|n| n == RECIPE_FILE) {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            return Ok(Self {
                origin: path.to_path_buf(),
                recipe_dir: dir.to_path_buf(),
                extracted: None,
            });
        }

        match detect_compression(path) {
            Some(format) => Self::extract(path, format),
            None => Err(Error::NotARecipe(path.to_path_buf())),
        }
    }

    fn extract(path: &Path, format: CompressionFormat) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::IoError(format!("Failed to open {}: {}", path.display(), e)))?;

        let reader: Box<dyn Read> = match format {
            CompressionFormat::Bzip2 => Box::new(BzDecoder::new(file)),
            CompressionFormat::Gzip => Box::new(GzDecoder::new(file)),
            CompressionFormat::Xz => Box::new(XzDecoder::new(file)),
            CompressionFormat::Zstd => Box::new(zstd::Decoder::new(file)?),
            CompressionFormat::None => Box::new(file),
        };

        let temp = TempDir::new()?;
        Archive::new(reader).unpack(temp.path()).map_err(|e| {
            Error::IoError(format!("Failed to unpack {}: {}", path.display(), e))
        })?;

        let recipe_dir =
            find_recipe_dir(temp.path()).ok_or_else(|| Error::NotARecipe(path.to_path_buf()))?;
        debug!(
            "Unpacked recipe from {} into {}",
            path.display(),
            recipe_dir.display()
        );

        Ok(Self {
            origin: path.to_path_buf(),
            recipe_dir,
            extracted: Some(temp),
        })
    }

    /// Path the recipe was opened from
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Directory holding `recipe.toml`
    pub fn recipe_dir(&self) -> &Path {
        &self.recipe_dir
    }

    /// Full path of `recipe.toml`
    pub fn recipe_path(&self) -> PathBuf {
        self.recipe_dir.join(RECIPE_FILE)
    }

    /// Whether the recipe was unpacked from an archive
    pub fn is_extracted(&self) -> bool {
        self.extracted.is_some()
    }

    /// Parse the recipe template
    pub fn read_recipe(&self) -> Result<RecipeTemplate> {
        parse_recipe_file(&self.recipe_path())
    }

    /// Parse the variant table shipped with the recipe, if any
    pub fn read_variants(&self) -> Result<Option<VariantTable>> {
        let path = self.recipe_dir.join(VARIANT_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        VariantTable::from_file(&path).map(Some)
    }
}

/// Locate the recipe inside an unpacked archive
fn find_recipe_dir(root: &Path) -> Option<PathBuf> {
    for candidate in [root.to_path_buf(), root.join("info").join("recipe")] {
        if candidate.join(RECIPE_FILE).is_file() {
            return Some(candidate);
        }
    }

    WalkDir::new(root)
        .max_depth(MAX_RECIPE_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == RECIPE_FILE)
        .and_then(|e| e.path().parent().map(Path::to_path_buf))
}

/// Open a recipe for rendering
pub fn open_recipe(path: &Path) -> Result<RecipeSource> {
    RecipeSource::open(path)
}

/// Run `f` against an opened recipe, releasing it afterwards
///
/// Any temporary files are removed before this returns, on success and on
/// failure alike.
pub fn with_recipe<T, F>(path: &Path, f: F) -> Result<T>
where
    F: FnOnce(&RecipeSource) -> Result<T>,
{
    let source = RecipeSource::open(path)?;
    f(&source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const RECIPE: &str = "[package]\nname = \"demo\"\nversion = \"1.0\"\n";

    #[test]
    fn test_open_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(RECIPE_FILE), RECIPE).unwrap();

        let source = open_recipe(dir.path()).unwrap();
        assert_eq!(source.recipe_dir(), dir.path());
        assert!(!source.is_extracted());
        assert_eq!(source.read_recipe().unwrap().package.name, "demo");
        assert!(source.read_variants().unwrap().is_none());
    }

    #[test]
    fn test_open_recipe_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join(RECIPE_FILE);
        fs::write(&file, RECIPE).unwrap();

        let source = open_recipe(&file).unwrap();
        assert_eq!(source.recipe_dir(), dir.path());
    }

    #[test]
    fn test_nonexistent() {
        let err = open_recipe(Path::new("/definitely/not/here")).unwrap_err();
        assert_eq!(err.to_string(), "non-existent: /definitely/not/here");
    }

    #[test]
    fn test_non_recipe_directory_and_file() {
        let dir = TempDir::new().unwrap();
        let err = open_recipe(dir.path()).unwrap_err();
        assert!(matches!(err, Error::NotARecipe(_)));

        let file = dir.path().join("notes.txt");
        fs::write(&file, "hello").unwrap();
        let err = open_recipe(&file).unwrap_err();
        assert_eq!(err.to_string(), format!("non-recipe: {}", file.display()));
    }

    #[test]
    fn test_archive_extension_detection() {
        assert!(is_recipe_archive(Path::new("pkg-1.0-0.tar.bz2")));
        assert!(is_recipe_archive(Path::new("recipe.TGZ")));
        assert!(is_recipe_archive(Path::new("x.tar.zst")));
        assert!(!is_recipe_archive(Path::new("pkg-1.0-0.conda")));
        assert!(!is_recipe_archive(Path::new("notes.txt")));
    }

    fn write_tarball(path: &Path, recipe: &str) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(file);
        let mut header = tar::Header::new_gnu();
        header.set_size(recipe.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "info/recipe/recipe.toml", recipe.as_bytes())
            .unwrap();
        builder.finish().unwrap();
    }

    #[test]
    fn test_open_plain_tarball() {
        let dir = TempDir::new().unwrap();
        let tarball = dir.path().join("demo.tar");
        write_tarball(&tarball, RECIPE);

        let extracted_root;
        {
            let source = open_recipe(&tarball).unwrap();
            assert!(source.is_extracted());
            assert!(source.recipe_dir().ends_with("info/recipe"));
            assert_eq!(source.read_recipe().unwrap().package.version, "1.0");
            extracted_root = source.recipe_dir().to_path_buf();
        }
        // Dropping the handle removes the unpacked tree
        assert!(!extracted_root.exists());
    }

    #[test]
    fn test_with_recipe_releases_on_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(RECIPE_FILE), "not = [valid").unwrap();

        let result = with_recipe(dir.path(), |source| source.read_recipe());
        assert!(matches!(result, Err(Error::ParseError(_))));
    }

    #[test]
    fn test_with_recipe_removes_archive_on_error() {
        let dir = TempDir::new().unwrap();
        let tarball = dir.path().join("broken.tar");
        write_tarball(&tarball, "not = [valid");

        let mut unpacked = None;
        let result = with_recipe(&tarball, |source| {
            assert!(source.is_extracted());
            unpacked = Some(source.recipe_dir().to_path_buf());
            source.read_recipe()
        });

        assert!(matches!(result, Err(Error::ParseError(_))));
        let unpacked = unpacked.unwrap();
        assert!(unpacked.ends_with("info/recipe"));
        assert!(!unpacked.exists());
    }
}

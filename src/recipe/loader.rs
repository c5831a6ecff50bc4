// src/recipe/loader.rs

use std::fs;
use std::path::Path;

use crate::errors::Result;
use crate::recipe::model::{RawRecipe, Recipe};

/// Load a recipe file from a given path and return the raw [`RawRecipe`].
///
/// This only performs TOML deserialization; it does **not** perform
/// semantic validation (DAG correctness, etc.). Use [`load_and_validate`]
/// for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawRecipe> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawRecipe = toml::from_str(&contents)?;
    Ok(raw)
}

/// Load a recipe file and run validation.
///
/// This is the recommended entry point:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for unknown `after` references, DAG cycles, missing tools and
///   basic per-stage sanity.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Recipe> {
    let raw = load_from_path(&path)?;
    Recipe::try_from(raw)
}

//! Common test utilities: cookbook trees and recipe environments.

#![allow(dead_code)]

use std::path::Path;

use tempfile::TempDir;

use shellforge::{Cookbook, Package, Recipe, SharedPackage};

/// A throwaway environment: a cookbook tree, a shared package, and an
/// export destination, all inside one temp directory.
pub struct TestEnv {
    pub dir: TempDir,
    pub package: SharedPackage,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        for sub in [
            "cookbook/files",
            "cookbook/recipes",
            "cookbook/templates",
            "cookbook/attributes",
            "dist",
        ] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        Self {
            dir,
            package: Package::new().unwrap().shared(),
        }
    }

    pub fn cookbook(&self) -> Cookbook {
        Cookbook::from_root(self.dir.path().join("cookbook"))
    }

    pub fn dist(&self) -> std::path::PathBuf {
        self.dir.path().join("dist")
    }

    /// Seed a file under the cookbook root.
    pub fn seed(&self, rel: &str, content: &str) {
        let path = self.dir.path().join("cookbook").join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    /// Open a recipe rendering into `target` in the shared package.
    pub fn recipe(&self, target: &str) -> Recipe {
        Recipe::new(self.package.clone(), self.cookbook(), target).unwrap()
    }

    /// Close the recipe and read back what it rendered.
    pub fn rendered(&self, recipe: &mut Recipe) -> String {
        recipe.close().unwrap();
        self.package
            .borrow()
            .content(recipe.target(), None, None)
            .unwrap()
            .unwrap_or_default()
    }
}

/// Read a file under a directory, panicking with a useful message.
pub fn read(dir: &Path, rel: &str) -> String {
    let path = dir.join(rel);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

//! Cookbook-backed source operations.
//!
//! These register supporting artifacts into the shared package while the
//! script is being rendered: verbatim files, rendered templates, and
//! attribute-file defaults. Each returns the target path the generated
//! script can reference.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::attributes;
use crate::cookbook::Kind;
use crate::package::{ExportOptions, Source};

use super::{Recipe, RecipeError};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_][A-Za-z0-9_.-]*)\s*\}\}").unwrap());

impl Recipe {
    /// Register the named cookbook file into the package and return its
    /// target path.
    pub fn file(&mut self, name: &str) -> Result<String, RecipeError> {
        let source = self.cookbook().require(Kind::Files, name)?;
        let mut pkg = self.package.borrow_mut();
        let target = pkg.next_target_path(&format!("files/{name}"));
        pkg.register(&target, Source::Path(source), ExportOptions::default())?;
        Ok(target)
    }

    /// Register every cookbook file matching a glob pattern; returns the
    /// target paths in cookbook-root order.
    pub fn files(&mut self, pattern: &str) -> Result<Vec<String>, RecipeError> {
        let matches = self.cookbook().matching(Kind::Files, pattern)?;
        let mut targets = Vec::with_capacity(matches.len());
        let mut pkg = self.package.borrow_mut();
        for (name, path) in matches {
            let target = pkg.next_target_path(&format!("files/{name}"));
            pkg.register(&target, Source::Path(path), ExportOptions::default())?;
            targets.push(target);
        }
        Ok(targets)
    }

    /// Render the named template into a fresh package spool and return
    /// its target path.
    ///
    /// `{{ dotted.key }}` placeholders resolve from `vars` first, then
    /// the attribute view; an unknown key fails naming it.
    pub fn template(&mut self, name: &str, vars: &Value) -> Result<String, RecipeError> {
        let path = self.cookbook().require(Kind::Templates, name)?;
        let raw = std::fs::read_to_string(&path)?;
        let rendered = self.render_placeholders(&raw, vars)?;
        let target = {
            let mut pkg = self.package.borrow_mut();
            let target = pkg.next_target_path(&format!("files/{name}"));
            let spool = pkg.add(&target, ExportOptions::default())?;
            spool.borrow_mut().write_str(&rendered)?;
            spool.borrow_mut().flush()?;
            target
        };
        Ok(target)
    }

    /// Load a TOML attribute file as defaults under the current view.
    ///
    /// Values already present, the package env included, keep
    /// precedence over what the file brings in.
    pub fn attributes(&mut self, name: &str) -> Result<(), RecipeError> {
        let path = self.cookbook().require(Kind::Attributes, name)?;
        let mut merged = attributes::load_toml(&path)?;
        let root = self.attrs_root();
        let mut view = root.borrow_mut();
        let current = std::mem::replace(&mut *view, attributes::root());
        attributes::deep_merge(&mut merged, current);
        *view = merged;
        Ok(())
    }

    /// Absolute path of a nested recipe for an external driver to
    /// evaluate against a [`spawn`](Recipe::spawn)ed child.
    pub fn find_recipe(&self, name: &str) -> Result<std::path::PathBuf, RecipeError> {
        Ok(self.cookbook().require(Kind::Recipes, name)?)
    }

    fn render_placeholders(&self, input: &str, vars: &Value) -> Result<String, RecipeError> {
        let mut out = String::with_capacity(input.len());
        let mut last_end = 0;
        for caps in PLACEHOLDER.captures_iter(input) {
            let whole = caps.get(0).expect("group 0 always present");
            let key = &caps[1];
            let value = attributes::get(vars, key)
                .cloned()
                .or_else(|| self.attr(key))
                .ok_or_else(|| RecipeError::UndefinedTemplateVar {
                    name: key.to_string(),
                })?;
            out.push_str(&input[last_end..whole.start()]);
            match value {
                Value::String(text) => out.push_str(&text),
                other => out.push_str(&other.to_string()),
            }
            last_end = whole.end();
        }
        out.push_str(&input[last_end..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookbook::Cookbook;
    use crate::package::Package;
    use serde_json::json;
    use tempfile::TempDir;

    fn seeded_root() -> TempDir {
        let dir = TempDir::new().unwrap();
        for sub in ["files", "recipes", "templates", "attributes"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        std::fs::write(dir.path().join("files/motd"), "welcome\n").unwrap();
        std::fs::write(dir.path().join("files/issue"), "issue\n").unwrap();
        std::fs::write(
            dir.path().join("templates/nginx.conf.tmpl"),
            "server_name {{ server.name }};\nlisten {{ port }};\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("attributes/defaults.toml"),
            "[server]\nname = \"default\"\nworkers = 4\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("recipes/base.sh"), "").unwrap();
        dir
    }

    fn test_recipe(root: &TempDir) -> Recipe {
        let package = Package::new().unwrap().shared();
        Recipe::new(package, Cookbook::from_root(root.path()), "install.sh").unwrap()
    }

    #[test]
    fn test_file_registers_and_returns_target() {
        let root = seeded_root();
        let mut recipe = test_recipe(&root);

        let target = recipe.file("motd").unwrap();
        assert_eq!(target, "files/motd");

        let pkg = recipe.package();
        let content = pkg.borrow().content("files/motd", None, None).unwrap();
        assert_eq!(content, Some("welcome\n".to_string()));
    }

    #[test]
    fn test_file_twice_disambiguates_targets() {
        let root = seeded_root();
        let mut recipe = test_recipe(&root);

        assert_eq!(recipe.file("motd").unwrap(), "files/motd");
        assert_eq!(recipe.file("motd").unwrap(), "files/motd.1");
    }

    #[test]
    fn test_file_unresolvable() {
        let root = seeded_root();
        let mut recipe = test_recipe(&root);

        let err = recipe.file("ghost").unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_files_glob() {
        let root = seeded_root();
        let mut recipe = test_recipe(&root);

        let mut targets = recipe.files("*").unwrap();
        targets.sort();
        assert_eq!(targets, vec!["files/issue", "files/motd"]);
    }

    #[test]
    fn test_template_renders_vars_over_attrs() {
        let root = seeded_root();
        let mut recipe = test_recipe(&root);
        recipe.set_attr("server.name", json!("from-attrs"));
        recipe.set_attr("port", json!(80));

        let target = recipe
            .template("nginx.conf", &json!({"server": {"name": "from-vars"}}))
            .unwrap();

        assert_eq!(target, "files/nginx.conf");
        let pkg = recipe.package();
        let content = pkg.borrow().content(&target, None, None).unwrap();
        assert_eq!(
            content,
            Some("server_name from-vars;\nlisten 80;\n".to_string())
        );
    }

    #[test]
    fn test_template_unknown_key_fails() {
        let root = seeded_root();
        let mut recipe = test_recipe(&root);

        let err = recipe.template("nginx.conf", &json!({})).unwrap_err();
        assert!(matches!(
            err,
            RecipeError::UndefinedTemplateVar { ref name } if name == "server.name"
        ));
    }

    #[test]
    fn test_attributes_load_as_defaults() {
        let root = seeded_root();
        let mut recipe = test_recipe(&root);
        recipe.set_attr("server.name", json!("kept"));

        recipe.attributes("defaults").unwrap();

        // Existing values win; new keys fill in.
        assert_eq!(recipe.attr("server.name"), Some(json!("kept")));
        assert_eq!(recipe.attr("server.workers"), Some(json!(4)));
    }

    #[test]
    fn test_find_recipe() {
        let root = seeded_root();
        let recipe = test_recipe(&root);

        let path = recipe.find_recipe("base").unwrap();
        assert_eq!(path, root.path().join("recipes/base.sh"));

        assert!(recipe.find_recipe("ghost").is_err());
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::{error, info, warn};

use crate::error::{RecipeError, RecipeResult};
use crate::recipe::{Recipe, RecipePatch};

pub type RecipeMap = BTreeMap<String, Recipe>;

/// What `RecipeStore::load` found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(usize),
    Created,
    Recovered { backup: PathBuf },
    Unreadable,
}

/// In-memory name → recipe map backed by one JSON file.
#[derive(Debug, Clone)]
pub struct RecipeStore {
    path: PathBuf,
    recipes: RecipeMap,
    /// Set while the backing file holds bytes that could be neither read nor
    /// moved aside; saving would destroy them.
    locked: bool,
}

impl RecipeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            recipes: RecipeMap::new(),
            locked: false,
        }
    }

    /// Convenience constructor that immediately loads the backing file.
    pub fn open(path: impl Into<PathBuf>) -> (Self, LoadOutcome) {
        let mut store = Self::new(path);
        let outcome = store.load();
        (store, outcome)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Recipe> {
        self.recipes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.recipes.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.recipes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Recipe)> {
        self.recipes
            .iter()
            .map(|(name, recipe)| (name.as_str(), recipe))
    }

    pub fn recipes(&self) -> &RecipeMap {
        &self.recipes
    }

    /// True when the last load could not read the backing file; saves are
    /// refused until a later load succeeds.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Replaces the in-memory map with the backing file's contents. Never fails:
    /// a missing file is created empty and a malformed one is moved aside.
    pub fn load(&mut self) -> LoadOutcome {
        self.recipes.clear();
        self.locked = false;

        if !self.path.exists() {
            warn!(
                "recipe file {} not found; creating an empty one",
                self.path.display()
            );
            return match self.save() {
                Ok(()) => LoadOutcome::Created,
                Err(error) => {
                    error!("{error}");
                    LoadOutcome::Unreadable
                }
            };
        }

        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) => {
                error!("failed to read {}: {error}", self.path.display());
                self.locked = true;
                return LoadOutcome::Unreadable;
            }
        };

        match serde_json::from_slice::<RecipeMap>(&bytes) {
            Ok(recipes) => {
                info!(
                    "loaded {} recipes from {}",
                    recipes.len(),
                    self.path.display()
                );
                self.recipes = recipes;
                LoadOutcome::Loaded(self.recipes.len())
            }
            Err(parse_error) => {
                let parse_error = RecipeError::Parse {
                    path: self.path.clone(),
                    message: parse_error.to_string(),
                };
                error!("{parse_error}; starting with an empty recipe collection");
                self.recover_from_corruption()
            }
        }
    }

    fn recover_from_corruption(&mut self) -> LoadOutcome {
        let backup = match plan_backup_path(&self.path) {
            Ok(backup) => backup,
            Err(error) => {
                error!("failed to plan recipe backup: {error}");
                self.locked = true;
                return LoadOutcome::Unreadable;
            }
        };
        if let Err(error) = fs::rename(&self.path, &backup) {
            error!(
                "failed to back up corrupted recipe file {}: {error}",
                self.path.display()
            );
            self.locked = true;
            return LoadOutcome::Unreadable;
        }
        warn!("corrupted recipe file backed up to {}", backup.display());
        if let Err(error) = self.save() {
            error!("{error}");
        }
        LoadOutcome::Recovered { backup }
    }

    pub fn save(&self) -> RecipeResult<()> {
        if self.locked {
            return Err(RecipeError::persistence(
                &self.path,
                io::Error::other("file could not be read at load time; refusing to overwrite it"),
            ));
        }
        write_pretty_json(&self.path, &self.recipes)
            .map_err(|source| RecipeError::persistence(&self.path, source))?;
        info!(
            "saved {} recipes to {}",
            self.recipes.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn create(&mut self, name: &str, recipe: Recipe) -> RecipeResult<()> {
        let name = validate_name(name)?;
        if self.recipes.contains_key(name) {
            return Err(RecipeError::DuplicateName(name.to_string()));
        }
        recipe.validate()?;
        self.recipes.insert(name.to_string(), recipe);
        self.save()
    }

    /// Overwrites an existing record wholesale.
    pub fn replace(&mut self, name: &str, recipe: Recipe) -> RecipeResult<()> {
        let name = validate_name(name)?;
        if !self.recipes.contains_key(name) {
            return Err(RecipeError::NotFound(name.to_string()));
        }
        recipe.validate()?;
        self.recipes.insert(name.to_string(), recipe);
        self.save()
    }

    pub fn edit(&mut self, name: &str, patch: &RecipePatch) -> RecipeResult<()> {
        let recipe = self
            .recipes
            .get_mut(name.trim())
            .ok_or_else(|| RecipeError::NotFound(name.trim().to_string()))?;
        patch.apply(recipe);
        self.save()
    }

    pub fn delete(&mut self, name: &str) -> RecipeResult<Recipe> {
        let removed = self
            .recipes
            .remove(name.trim())
            .ok_or_else(|| RecipeError::NotFound(name.trim().to_string()))?;
        self.save()?;
        Ok(removed)
    }

    /// Case-insensitive substring match on the name or the compact JSON of the
    /// record. Each record appears at most once, in store order.
    pub fn search(&self, term: &str) -> RecipeResult<Vec<(&str, &Recipe)>> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Err(RecipeError::validation("Search term cannot be empty."));
        }
        Ok(self
            .iter()
            .filter(|(name, recipe)| {
                name.to_lowercase().contains(&needle)
                    || recipe.search_text().to_lowercase().contains(&needle)
            })
            .collect())
    }

    pub fn export(&self, target: &Path) -> RecipeResult<()> {
        write_pretty_json(target, &self.recipes)
            .map_err(|source| RecipeError::persistence(target, source))?;
        info!("recipes exported to {}", target.display());
        Ok(())
    }
}

/// Resolves a user-typed export file name: blank means `default`, and names
/// without a `.js`/`.json` extension get `.js` appended.
pub fn export_target(input: &str, default: &Path) -> PathBuf {
    let input = input.trim();
    if input.is_empty() {
        return default.to_path_buf();
    }
    let lower = input.to_ascii_lowercase();
    if lower.ends_with(".js") || lower.ends_with(".json") {
        PathBuf::from(input)
    } else {
        PathBuf::from(format!("{input}.js"))
    }
}

/// JSON with 4-space indentation, the layout used for every file this crate writes.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> String {
    render_pretty_json(value)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default()
}

fn render_pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    Ok(buffer)
}

pub(crate) fn write_pretty_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut buffer = render_pretty_json(value).map_err(io::Error::other)?;
    buffer.push(b'\n');

    let mut file = fs::File::create(path)?;
    file.write_all(&buffer)?;
    file.flush()
}

fn validate_name(name: &str) -> RecipeResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RecipeError::validation("Recipe name cannot be empty."));
    }
    Ok(name)
}

fn plan_backup_path(path: &Path) -> io::Result<PathBuf> {
    let timestamp = unix_timestamp()?;
    let base = format!("{}.backup.{timestamp}", path.display());
    let mut candidate = PathBuf::from(&base);
    let mut counter = 1usize;
    while candidate.exists() {
        candidate = PathBuf::from(format!("{base}.{counter}"));
        counter += 1;
    }
    Ok(candidate)
}

fn unix_timestamp() -> io::Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .map_err(io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::RecipeAddon;
    use tempfile::tempdir;

    fn recipe(output: &str, ingredients: &[&str]) -> Recipe {
        Recipe {
            kind: "shaped".to_string(),
            output: output.to_string(),
            ingredients: ingredients.iter().map(ToString::to_string).collect(),
            addon: None,
        }
    }

    fn backups_in(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| entry.expect("entry").path())
            .filter(|path| path.to_string_lossy().contains(".backup."))
            .collect()
    }

    #[test]
    fn missing_file_is_created_empty() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("recipes.json");
        let (store, outcome) = RecipeStore::open(&path);
        assert_eq!(outcome, LoadOutcome::Created);
        assert!(store.is_empty());
        let content = fs::read_to_string(&path).expect("read");
        assert_eq!(content.trim(), "{}");
    }

    #[test]
    fn create_then_load_round_trips() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("recipes.json");
        let mut store = RecipeStore::new(&path);
        let mut modded = recipe("create:brass_ingot", &["copper", "zinc"]);
        modded.addon = Some(RecipeAddon {
            name: "KubeJS Create".to_string(),
            url: "https://kubejs.com/wiki/addons/kubejs-create".to_string(),
        });
        store.create("brass", modded.clone()).expect("create");
        store
            .create("iron_block", recipe("minecraft:iron_block", &["iron"]))
            .expect("create");

        let (reloaded, outcome) = RecipeStore::open(&path);
        assert_eq!(outcome, LoadOutcome::Loaded(2));
        assert_eq!(reloaded.get("brass"), Some(&modded));
        assert_eq!(reloaded.recipes(), store.recipes());
    }

    #[test]
    fn saved_file_uses_four_space_indent() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("recipes.json");
        let mut store = RecipeStore::new(&path);
        store.create("a", recipe("x", &["y"])).expect("create");
        let content = fs::read_to_string(&path).expect("read");
        assert!(content.contains("\n    \"a\": {\n        \"type\": \"shaped\""));
    }

    #[test]
    fn duplicate_create_keeps_existing_record() {
        let temp = tempdir().expect("tempdir");
        let mut store = RecipeStore::new(temp.path().join("recipes.json"));
        store.create("gear", recipe("first", &["a"])).expect("create");
        let error = store
            .create("gear", recipe("second", &["b"]))
            .expect_err("duplicate");
        assert!(matches!(error, RecipeError::DuplicateName(ref name) if name == "gear"));
        assert_eq!(store.get("gear").map(|r| r.output.as_str()), Some("first"));
    }

    #[test]
    fn create_rejects_invalid_records() {
        let temp = tempdir().expect("tempdir");
        let mut store = RecipeStore::new(temp.path().join("recipes.json"));
        assert!(matches!(
            store.create("  ", recipe("x", &["y"])),
            Err(RecipeError::Validation(_))
        ));
        assert!(matches!(
            store.create("gear", recipe("x", &[])),
            Err(RecipeError::Validation(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn blank_edit_leaves_record_unchanged() {
        let temp = tempdir().expect("tempdir");
        let mut store = RecipeStore::new(temp.path().join("recipes.json"));
        let original = recipe("x", &["y", "z"]);
        store.create("gear", original.clone()).expect("create");
        store
            .edit(
                "gear",
                &RecipePatch {
                    kind: Some(" ".to_string()),
                    output: Some(String::new()),
                    ingredients: Some(",".to_string()),
                },
            )
            .expect("edit");
        assert_eq!(store.get("gear"), Some(&original));
    }

    #[test]
    fn edit_updates_and_persists() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("recipes.json");
        let mut store = RecipeStore::new(&path);
        store.create("gear", recipe("x", &["y"])).expect("create");
        store
            .edit(
                "gear",
                &RecipePatch {
                    kind: Some("shapeless".to_string()),
                    output: None,
                    ingredients: Some("a, b".to_string()),
                },
            )
            .expect("edit");
        let (reloaded, _) = RecipeStore::open(&path);
        let gear = reloaded.get("gear").expect("gear");
        assert_eq!(gear.kind, "shapeless");
        assert_eq!(gear.output, "x");
        assert_eq!(gear.ingredients, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn missing_names_fail_without_mutation() {
        let temp = tempdir().expect("tempdir");
        let mut store = RecipeStore::new(temp.path().join("recipes.json"));
        store.create("gear", recipe("x", &["y"])).expect("create");
        let before = store.recipes().clone();

        assert!(matches!(
            store.edit("nope", &RecipePatch::default()),
            Err(RecipeError::NotFound(_))
        ));
        assert!(matches!(store.delete("nope"), Err(RecipeError::NotFound(_))));
        assert!(matches!(
            store.replace("nope", recipe("a", &["b"])),
            Err(RecipeError::NotFound(_))
        ));
        assert_eq!(store.recipes(), &before);
    }

    #[test]
    fn delete_removes_and_persists() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("recipes.json");
        let mut store = RecipeStore::new(&path);
        store.create("gear", recipe("x", &["y"])).expect("create");
        let removed = store.delete("gear").expect("delete");
        assert_eq!(removed.output, "x");
        let (reloaded, _) = RecipeStore::open(&path);
        assert!(reloaded.is_empty());
    }

    #[test]
    fn search_matches_name_or_content_once() {
        let temp = tempdir().expect("tempdir");
        let mut store = RecipeStore::new(temp.path().join("recipes.json"));
        store
            .create("Iron_Gear", recipe("minecraft:iron_gear", &["iron"]))
            .expect("create");
        store
            .create("furnace", recipe("minecraft:furnace", &["cobblestone"]))
            .expect("create");
        store
            .create("ingot", recipe("minecraft:gold_ingot", &["IRON_nugget"]))
            .expect("create");

        let names = store
            .search("IRON")
            .expect("search")
            .into_iter()
            .map(|(name, _)| name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Iron_Gear", "ingot"]);

        assert!(store.search("diamond").expect("search").is_empty());
        assert!(matches!(store.search("   "), Err(RecipeError::Validation(_))));
    }

    #[test]
    fn corrupted_file_is_backed_up_and_reset() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("recipes.json");
        let bad = b"{ \"gear\": { broken";
        fs::write(&path, bad).expect("write");

        let (store, outcome) = RecipeStore::open(&path);
        assert!(store.is_empty());
        let LoadOutcome::Recovered { backup } = outcome else {
            panic!("expected recovery, got {outcome:?}");
        };
        assert_eq!(fs::read(&backup).expect("read backup"), bad);
        assert_eq!(fs::read_to_string(&path).expect("read").trim(), "{}");
    }

    #[test]
    fn invalid_utf8_is_backed_up_like_bad_json() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("recipes.json");
        let bad = b"{\"gear\": \xff\xfe broken";
        fs::write(&path, bad).expect("write");

        let (store, outcome) = RecipeStore::open(&path);
        assert!(store.is_empty());
        assert!(!store.is_locked());
        let LoadOutcome::Recovered { backup } = outcome else {
            panic!("expected recovery, got {outcome:?}");
        };
        assert_eq!(fs::read(&backup).expect("read backup"), bad);
        assert_eq!(fs::read_to_string(&path).expect("read").trim(), "{}");
    }

    #[test]
    fn unreadable_file_is_never_overwritten() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("recipes.json");
        fs::create_dir(&path).expect("directory in place of the file");

        let (mut store, outcome) = RecipeStore::open(&path);
        assert_eq!(outcome, LoadOutcome::Unreadable);
        assert!(store.is_locked());
        let error = store
            .create("gear", recipe("x", &["y"]))
            .expect_err("locked store");
        assert!(matches!(error, RecipeError::Persistence { .. }));
        assert!(store.save().is_err());
        assert!(path.is_dir());
    }

    #[test]
    fn failed_initial_write_is_not_reported_as_created() {
        let temp = tempdir().expect("tempdir");
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "file, not dir").expect("write");
        let (store, outcome) = RecipeStore::open(blocker.join("recipes.json"));
        assert_eq!(outcome, LoadOutcome::Unreadable);
        assert!(!store.is_locked());
    }

    #[test]
    fn backup_names_never_collide() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("recipes.json");
        fs::write(&path, "not json").expect("write");
        let _ = RecipeStore::open(&path);
        fs::write(&path, "still not json").expect("write");
        let _ = RecipeStore::open(&path);
        assert_eq!(backups_in(temp.path()).len(), 2);
    }

    #[test]
    fn wrong_shape_counts_as_corruption() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("recipes.json");
        fs::write(&path, r#"{"gear": {"type": "shaped"}}"#).expect("write");
        let (_, outcome) = RecipeStore::open(&path);
        assert!(matches!(outcome, LoadOutcome::Recovered { .. }));
    }

    #[test]
    fn save_failure_keeps_memory_intact() {
        let temp = tempdir().expect("tempdir");
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "file, not dir").expect("write");
        let mut store = RecipeStore::new(blocker.join("recipes.json"));
        let error = store
            .create("gear", recipe("x", &["y"]))
            .expect_err("cannot write under a file");
        assert!(matches!(error, RecipeError::Persistence { .. }));
        assert!(store.contains("gear"));
    }

    #[test]
    fn export_writes_without_mutation() {
        let temp = tempdir().expect("tempdir");
        let mut store = RecipeStore::new(temp.path().join("recipes.json"));
        store.create("gear", recipe("x", &["y"])).expect("create");
        let target = temp.path().join("out").join("export.js");
        store.export(&target).expect("export");
        let exported: RecipeMap =
            serde_json::from_str(&fs::read_to_string(&target).expect("read")).expect("parse");
        assert_eq!(&exported, store.recipes());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn export_target_defaults_and_extensions() {
        let default = Path::new("export.js");
        assert_eq!(export_target("  ", default), PathBuf::from("export.js"));
        assert_eq!(export_target("pack", default), PathBuf::from("pack.js"));
        assert_eq!(export_target("pack.json", default), PathBuf::from("pack.json"));
        assert_eq!(export_target("pack.JS", default), PathBuf::from("pack.JS"));
    }
}

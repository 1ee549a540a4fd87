//! Line-delimited JSON protocol for an external front-end.
//!
//! Each request is one JSON object per line with an `action` field; each
//! request other than `exit` gets exactly one response line. The loop ends on
//! `exit` or end of input, after which the store is saved one final time.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{error, info, warn};

use crate::addons::{AddonCache, AddonSource};
use crate::error::RecipeError;
use crate::recipe::Recipe;
use crate::store::{LoadOutcome, RecipeStore};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveRecipeRequest {
    recipe_name: String,
    recipe: Recipe,
    #[serde(default = "default_is_new")]
    is_new: bool,
}

fn default_is_new() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRecipeRequest {
    recipe_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRecipesRequest {
    #[serde(default)]
    search_term: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportRecipesRequest {
    file_path: String,
}

enum Step {
    Reply(Value),
    Exit,
}

pub struct IpcSession<'a, R, W> {
    store: &'a mut RecipeStore,
    addons: &'a AddonCache,
    source: &'a dyn AddonSource,
    input: R,
    output: W,
}

impl<'a, R: BufRead, W: Write> IpcSession<'a, R, W> {
    pub fn new(
        store: &'a mut RecipeStore,
        addons: &'a AddonCache,
        source: &'a dyn AddonSource,
        input: R,
        output: W,
    ) -> Self {
        Self {
            store,
            addons,
            source,
            input,
            output,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        info!("IPC session started");
        let result = self.serve();
        if self.store.is_locked() {
            warn!(
                "skipping final save; {} could not be read at load time",
                self.store.path().display()
            );
        } else {
            info!("performing final save before shutdown");
            if let Err(error) = self.store.save() {
                error!("final save failed: {error}");
            }
        }
        info!("IPC session finished");
        result
    }

    fn serve(&mut self) -> io::Result<()> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                info!("input stream closed");
                return Ok(());
            }
            let request = line.trim();
            if request.is_empty() {
                continue;
            }
            match self.handle_line(request) {
                Step::Reply(response) => self.send(&response)?,
                Step::Exit => {
                    info!("received exit command");
                    return Ok(());
                }
            }
        }
    }

    fn send(&mut self, response: &Value) -> io::Result<()> {
        let encoded = serde_json::to_string(response).map_err(io::Error::other)?;
        writeln!(self.output, "{encoded}")?;
        self.output.flush()
    }

    fn handle_line(&mut self, line: &str) -> Step {
        let message: Value = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(error) => {
                warn!("invalid JSON received: {error}");
                return Step::Reply(json!({
                    "success": false,
                    "error": format!("Invalid JSON: {error}"),
                }));
            }
        };
        let action = message
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        info!("processing IPC message: {action}");

        let response = match action.as_str() {
            "exit" => return Step::Exit,
            "load_recipes" => self.load_recipes(),
            "save_recipe" => self.save_recipe(&action, message),
            "delete_recipe" => self.delete_recipe(&action, message),
            "search_recipes" => self.search_recipes(&action, message),
            "export_recipes" => self.export_recipes(&action, message),
            "fetch_addons" => self.fetch_addons(),
            _ => {
                warn!("unknown action: {action}");
                json!({
                    "action": "unknown_action",
                    "success": false,
                    "error": format!("Unknown action: {action}"),
                })
            }
        };
        Step::Reply(response)
    }

    fn load_recipes(&mut self) -> Value {
        let warning = match self.store.load() {
            LoadOutcome::Loaded(_) | LoadOutcome::Created => None,
            LoadOutcome::Recovered { backup } => Some(format!(
                "Recipe file was malformed; original moved to {}",
                backup.display()
            )),
            LoadOutcome::Unreadable => Some(format!(
                "Recipe file {} could not be read; changes will not be saved",
                self.store.path().display()
            )),
        };
        let mut response = json!({
            "action": "recipes_loaded",
            "success": true,
            "recipes": self.store.recipes(),
        });
        if let (Some(warning), Some(fields)) = (warning, response.as_object_mut()) {
            warn!("{warning}");
            fields.insert("warning".to_string(), json!(warning));
        }
        response
    }

    fn save_recipe(&mut self, action: &str, message: Value) -> Value {
        let request: SaveRecipeRequest = match parse_request(action, message) {
            Ok(request) => request,
            Err(response) => return response,
        };
        let result = if request.is_new {
            self.store.create(&request.recipe_name, request.recipe)
        } else {
            self.store.replace(&request.recipe_name, request.recipe)
        };
        match result {
            Ok(()) => json!({
                "action": "recipe_saved",
                "success": true,
                "recipeName": request.recipe_name.trim(),
                "isNew": request.is_new,
            }),
            Err(error) => failure("recipe_saved", &error),
        }
    }

    fn delete_recipe(&mut self, action: &str, message: Value) -> Value {
        let request: DeleteRecipeRequest = match parse_request(action, message) {
            Ok(request) => request,
            Err(response) => return response,
        };
        match self.store.delete(&request.recipe_name) {
            Ok(_) => json!({
                "action": "recipe_deleted",
                "success": true,
                "recipeName": request.recipe_name.trim(),
            }),
            Err(error) => failure("recipe_deleted", &error),
        }
    }

    fn search_recipes(&mut self, action: &str, message: Value) -> Value {
        let request: SearchRecipesRequest = match parse_request(action, message) {
            Ok(request) => request,
            Err(response) => return response,
        };
        match self.store.search(&request.search_term) {
            Ok(matches) => {
                let results = matches
                    .into_iter()
                    .map(|(name, recipe)| json!({ "name": name, "recipe": recipe }))
                    .collect::<Vec<_>>();
                json!({
                    "action": "search_results",
                    "success": true,
                    "results": results,
                    "searchTerm": request.search_term.trim().to_lowercase(),
                })
            }
            Err(error) => failure("search_results", &error),
        }
    }

    fn export_recipes(&mut self, action: &str, message: Value) -> Value {
        let request: ExportRecipesRequest = match parse_request(action, message) {
            Ok(request) => request,
            Err(response) => return response,
        };
        let file_path = request.file_path.trim();
        if file_path.is_empty() {
            return failure(
                "recipes_exported",
                &RecipeError::validation("File path is required"),
            );
        }
        match self.store.export(&PathBuf::from(file_path)) {
            Ok(()) => json!({
                "action": "recipes_exported",
                "success": true,
                "filePath": file_path,
            }),
            Err(error) => failure("recipes_exported", &error),
        }
    }

    fn fetch_addons(&mut self) -> Value {
        let outcome = self.addons.refresh(self.source);
        let mut response = Map::new();
        response.insert("action".to_string(), json!("addons_fetched"));
        response.insert("success".to_string(), json!(true));
        response.insert("addons".to_string(), json!(outcome.addons));
        response.insert("source".to_string(), json!(outcome.source.as_str()));
        if let Some(warning) = outcome.warning {
            response.insert("warning".to_string(), json!(warning));
        }
        Value::Object(response)
    }
}

/// Decodes the fields of a known action; malformed input becomes an
/// `<action>_error` response.
fn parse_request<T: DeserializeOwned>(action: &str, message: Value) -> Result<T, Value> {
    serde_json::from_value(message).map_err(|error| {
        warn!("malformed {action} request: {error}");
        json!({
            "action": format!("{action}_error"),
            "success": false,
            "error": error.to_string(),
        })
    })
}

fn failure(action: &str, error: &RecipeError) -> Value {
    warn!("{action} failed: {error}");
    json!({
        "action": action,
        "success": false,
        "error": error.to_string(),
        "errorKind": error.kind(),
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::fs;
    use std::io::Cursor;

    use super::*;
    use crate::addons::{Addon, builtin_fallback_addons};
    use crate::error::RecipeResult;
    use tempfile::{TempDir, tempdir};

    struct FailingSource {
        calls: Cell<usize>,
    }

    impl AddonSource for FailingSource {
        fn fetch_addons(&self) -> RecipeResult<Vec<Addon>> {
            self.calls.set(self.calls.get() + 1);
            Err(RecipeError::Fetch("connection refused".to_string()))
        }
    }

    fn run_session(temp: &TempDir, store: &mut RecipeStore, script: &str) -> Vec<Value> {
        let cache = AddonCache::new(temp.path().join("addons_db.json"), 7, "https://kubejs.com");
        let source = FailingSource {
            calls: Cell::new(0),
        };
        let mut output = Vec::new();
        IpcSession::new(
            store,
            &cache,
            &source,
            Cursor::new(script.as_bytes().to_vec()),
            &mut output,
        )
        .run()
        .expect("ipc run");
        String::from_utf8(output)
            .expect("utf8")
            .lines()
            .map(|line| serde_json::from_str(line).expect("response is JSON"))
            .collect()
    }

    const GEAR: &str =
        r#"{"type":"shaped","output":"minecraft:gear","ingredients":["minecraft:iron_ingot"]}"#;

    #[test]
    fn save_search_delete_round() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("recipes.json");
        let mut store = RecipeStore::new(&path);
        let script = format!(
            "{{\"action\":\"save_recipe\",\"recipeName\":\"gear\",\"recipe\":{GEAR}}}\n\
             \n\
             {{\"action\":\"search_recipes\",\"searchTerm\":\"IRON\"}}\n\
             {{\"action\":\"delete_recipe\",\"recipeName\":\"gear\"}}\n\
             {{\"action\":\"exit\"}}\n\
             {{\"action\":\"load_recipes\"}}\n"
        );
        let responses = run_session(&temp, &mut store, &script);
        assert_eq!(responses.len(), 3);

        assert_eq!(responses[0]["action"], "recipe_saved");
        assert_eq!(responses[0]["success"], true);
        assert_eq!(responses[0]["isNew"], true);

        assert_eq!(responses[1]["action"], "search_results");
        assert_eq!(responses[1]["searchTerm"], "iron");
        assert_eq!(responses[1]["results"][0]["name"], "gear");
        assert_eq!(responses[1]["results"][0]["recipe"]["output"], "minecraft:gear");

        assert_eq!(responses[2]["action"], "recipe_deleted");
        assert_eq!(responses[2]["success"], true);
        assert!(store.is_empty());
        assert_eq!(fs::read_to_string(&path).expect("read").trim(), "{}");
    }

    #[test]
    fn is_new_controls_create_versus_replace() {
        let temp = tempdir().expect("tempdir");
        let mut store = RecipeStore::new(temp.path().join("recipes.json"));
        let replaced = GEAR.replace("minecraft:gear", "minecraft:big_gear");
        let script = format!(
            "{{\"action\":\"save_recipe\",\"recipeName\":\"gear\",\"isNew\":false,\"recipe\":{GEAR}}}\n\
             {{\"action\":\"save_recipe\",\"recipeName\":\"gear\",\"recipe\":{GEAR}}}\n\
             {{\"action\":\"save_recipe\",\"recipeName\":\"gear\",\"recipe\":{GEAR}}}\n\
             {{\"action\":\"save_recipe\",\"recipeName\":\"gear\",\"isNew\":false,\"recipe\":{replaced}}}\n"
        );
        let responses = run_session(&temp, &mut store, &script);
        assert_eq!(responses[0]["success"], false);
        assert_eq!(responses[0]["errorKind"], "not_found");
        assert_eq!(responses[1]["success"], true);
        assert_eq!(responses[2]["success"], false);
        assert_eq!(responses[2]["errorKind"], "duplicate_name");
        assert_eq!(responses[3]["success"], true);
        assert_eq!(responses[3]["isNew"], false);
        assert_eq!(
            store.get("gear").map(|recipe| recipe.output.as_str()),
            Some("minecraft:big_gear")
        );
    }

    #[test]
    fn bad_input_gets_error_responses_without_closing() {
        let temp = tempdir().expect("tempdir");
        let mut store = RecipeStore::new(temp.path().join("recipes.json"));
        let script = "not json\n\
                      {\"action\":\"launch_rockets\"}\n\
                      {\"action\":\"save_recipe\",\"recipeName\":\"gear\"}\n\
                      {\"action\":\"search_recipes\",\"searchTerm\":\"\"}\n\
                      {\"action\":\"export_recipes\"}\n\
                      {\"action\":\"delete_recipe\",\"recipeName\":\"ghost\"}\n";
        let responses = run_session(&temp, &mut store, script);
        assert_eq!(responses.len(), 6);

        assert_eq!(responses[0]["success"], false);
        assert!(
            responses[0]["error"]
                .as_str()
                .expect("error")
                .starts_with("Invalid JSON: ")
        );
        assert!(responses[0].get("action").is_none());

        assert_eq!(responses[1]["action"], "unknown_action");
        assert_eq!(responses[1]["error"], "Unknown action: launch_rockets");

        assert_eq!(responses[2]["action"], "save_recipe_error");
        assert_eq!(responses[3]["action"], "search_results");
        assert_eq!(responses[3]["success"], false);
        assert_eq!(responses[4]["action"], "export_recipes_error");
        assert_eq!(responses[5]["action"], "recipe_deleted");
        assert_eq!(responses[5]["errorKind"], "not_found");
    }

    #[test]
    fn load_and_export_reflect_disk_state() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("recipes.json");
        fs::write(&path, format!("{{\"gear\": {GEAR}}}")).expect("write");
        let mut store = RecipeStore::new(&path);
        let target = temp.path().join("out.js");
        let script = format!(
            "{{\"action\":\"load_recipes\"}}\n{{\"action\":\"export_recipes\",\"filePath\":\"{}\"}}\n",
            target.display()
        );
        let responses = run_session(&temp, &mut store, &script);
        assert_eq!(responses[0]["action"], "recipes_loaded");
        assert_eq!(responses[0]["recipes"]["gear"]["type"], "shaped");
        assert_eq!(responses[1]["action"], "recipes_exported");
        assert_eq!(responses[1]["success"], true);
        assert!(
            fs::read_to_string(&target)
                .expect("export")
                .contains("minecraft:gear")
        );
    }

    #[test]
    fn fetch_addons_reports_fallback_warning() {
        let temp = tempdir().expect("tempdir");
        let mut store = RecipeStore::new(temp.path().join("recipes.json"));
        let responses = run_session(&temp, &mut store, "{\"action\":\"fetch_addons\"}\n");
        assert_eq!(responses[0]["action"], "addons_fetched");
        assert_eq!(responses[0]["success"], true);
        assert_eq!(responses[0]["source"], "fallback");
        assert!(responses[0]["warning"].is_string());
        let names = responses[0]["addons"]
            .as_array()
            .expect("addons")
            .iter()
            .map(|addon| addon["name"].as_str().expect("name").to_string())
            .collect::<Vec<_>>();
        let expected = builtin_fallback_addons()
            .into_iter()
            .map(|addon| addon.name)
            .collect::<Vec<_>>();
        assert_eq!(names, expected);
    }

    #[test]
    fn reload_of_malformed_file_warns_and_keeps_bytes() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("recipes.json");
        let mut store = RecipeStore::new(&path);
        fs::write(&path, "{ not json").expect("write");
        let responses = run_session(&temp, &mut store, "{\"action\":\"load_recipes\"}\n");
        assert_eq!(responses[0]["success"], true);
        assert!(
            responses[0]["warning"]
                .as_str()
                .expect("warning")
                .contains("malformed")
        );
        let backups = fs::read_dir(temp.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").path())
            .filter(|path| path.to_string_lossy().contains(".backup."))
            .collect::<Vec<_>>();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(&backups[0]).expect("backup"), "{ not json");
    }

    #[test]
    fn invalid_utf8_file_survives_session_shutdown() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("recipes.json");
        let bad = b"{\"gear\": \xff\xfe broken";
        fs::write(&path, bad).expect("write");

        let (mut store, outcome) = RecipeStore::open(&path);
        let LoadOutcome::Recovered { backup } = outcome else {
            panic!("expected recovery, got {outcome:?}");
        };
        run_session(&temp, &mut store, "{\"action\":\"exit\"}\n");
        assert_eq!(fs::read(&backup).expect("backup"), bad);
    }

    #[test]
    fn locked_store_skips_final_save() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("recipes.json");
        fs::create_dir(&path).expect("directory in place of the file");
        let (mut store, outcome) = RecipeStore::open(&path);
        assert_eq!(outcome, LoadOutcome::Unreadable);

        let script = format!(
            "{{\"action\":\"save_recipe\",\"recipeName\":\"gear\",\"recipe\":{GEAR}}}\n"
        );
        let responses = run_session(&temp, &mut store, &script);
        assert_eq!(responses[0]["success"], false);
        assert_eq!(responses[0]["errorKind"], "persistence");
        assert!(path.is_dir());
    }

    #[test]
    fn end_of_input_still_saves() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("recipes.json");
        let mut store = RecipeStore::new(&path);
        let responses = run_session(&temp, &mut store, "");
        assert!(responses.is_empty());
        assert!(path.exists());
    }
}

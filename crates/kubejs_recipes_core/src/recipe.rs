use serde::{Deserialize, Serialize};

use crate::addons::Addon;
use crate::error::{RecipeError, RecipeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeType {
    Shaped,
    Shapeless,
    Smithing,
    Smelting,
    Blasting,
    Smoking,
    CampfireCooking,
    Stonecutting,
    Brewing,
    Custom,
}

impl RecipeType {
    pub const ALL: [RecipeType; 10] = [
        Self::Shaped,
        Self::Shapeless,
        Self::Smithing,
        Self::Smelting,
        Self::Blasting,
        Self::Smoking,
        Self::CampfireCooking,
        Self::Stonecutting,
        Self::Brewing,
        Self::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shaped => "shaped",
            Self::Shapeless => "shapeless",
            Self::Smithing => "smithing",
            Self::Smelting => "smelting",
            Self::Blasting => "blasting",
            Self::Smoking => "smoking",
            Self::CampfireCooking => "campfire_cooking",
            Self::Stonecutting => "stonecutting",
            Self::Brewing => "brewing",
            Self::Custom => "custom",
        }
    }

    /// 1-based lookup matching the numbered menus.
    pub fn from_index(index: usize) -> Option<Self> {
        index
            .checked_sub(1)
            .and_then(|zero_based| Self::ALL.get(zero_based).copied())
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
    }
}

/// Addon association stored on a record as the flat `addon` / `addon_url` keys.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecipeAddon {
    #[serde(rename = "addon")]
    pub name: String,
    #[serde(rename = "addon_url")]
    pub url: String,
}

impl From<Addon> for RecipeAddon {
    fn from(addon: Addon) -> Self {
        Self {
            name: addon.name,
            url: addon.url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Recipe {
    #[serde(rename = "type")]
    pub kind: String,
    pub output: String,
    pub ingredients: Vec<String>,
    #[serde(flatten)]
    pub addon: Option<RecipeAddon>,
}

impl Recipe {
    pub fn validate(&self) -> RecipeResult<()> {
        if self.kind.trim().is_empty() {
            return Err(RecipeError::validation("Recipe type cannot be empty."));
        }
        if self.output.trim().is_empty() {
            return Err(RecipeError::validation("Output item cannot be empty."));
        }
        if self.ingredients.is_empty() || self.ingredients.iter().any(|item| item.trim().is_empty())
        {
            return Err(RecipeError::validation(
                "At least one valid ingredient is required.",
            ));
        }
        Ok(())
    }

    /// Compact JSON rendering used for content search.
    pub fn search_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Unvalidated user input for a new record.
#[derive(Debug, Clone, Default)]
pub struct RecipeDraft {
    pub kind: String,
    pub output: String,
    pub ingredients: String,
    pub addon: Option<Addon>,
}

impl RecipeDraft {
    pub fn validate(&self) -> RecipeResult<Recipe> {
        let recipe = Recipe {
            kind: self.kind.trim().to_string(),
            output: self.output.trim().to_string(),
            ingredients: parse_ingredients(&self.ingredients),
            addon: self.addon.clone().map(RecipeAddon::from),
        };
        recipe.validate()?;
        Ok(recipe)
    }
}

/// Partial update; blank or absent fields keep the current value.
#[derive(Debug, Clone, Default)]
pub struct RecipePatch {
    pub kind: Option<String>,
    pub output: Option<String>,
    pub ingredients: Option<String>,
}

impl RecipePatch {
    pub fn is_blank(&self) -> bool {
        non_blank(self.kind.as_deref()).is_none()
            && non_blank(self.output.as_deref()).is_none()
            && self
                .ingredients
                .as_deref()
                .map(parse_ingredients)
                .is_none_or(|items| items.is_empty())
    }

    pub(crate) fn apply(&self, recipe: &mut Recipe) {
        if let Some(kind) = non_blank(self.kind.as_deref()) {
            recipe.kind = kind.to_string();
        }
        if let Some(output) = non_blank(self.output.as_deref()) {
            recipe.output = output.to_string();
        }
        if let Some(raw) = self.ingredients.as_deref() {
            let ingredients = parse_ingredients(raw);
            if !ingredients.is_empty() {
                recipe.ingredients = ingredients;
            }
        }
    }
}

pub fn parse_ingredients(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Recipe {
        Recipe {
            kind: "shaped".to_string(),
            output: "minecraft:iron_block".to_string(),
            ingredients: vec!["minecraft:iron_ingot".to_string()],
            addon: None,
        }
    }

    #[test]
    fn recipe_type_index_is_one_based() {
        assert_eq!(RecipeType::from_index(1), Some(RecipeType::Shaped));
        assert_eq!(RecipeType::from_index(10), Some(RecipeType::Custom));
        assert_eq!(RecipeType::from_index(0), None);
        assert_eq!(RecipeType::from_index(11), None);
        assert_eq!(
            RecipeType::parse("Campfire_Cooking"),
            Some(RecipeType::CampfireCooking)
        );
    }

    #[test]
    fn parse_ingredients_trims_and_drops_empties() {
        assert_eq!(
            parse_ingredients(" a , ,b,, c "),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(parse_ingredients(" , ,").is_empty());
    }

    #[test]
    fn draft_rejects_missing_fields() {
        let draft = RecipeDraft {
            kind: "shaped".to_string(),
            output: "  ".to_string(),
            ingredients: "a".to_string(),
            addon: None,
        };
        let error = draft.validate().expect_err("blank output");
        assert_eq!(error.to_string(), "Output item cannot be empty.");

        let draft = RecipeDraft {
            kind: "shaped".to_string(),
            output: "x".to_string(),
            ingredients: " , ".to_string(),
            addon: None,
        };
        let error = draft.validate().expect_err("no ingredients");
        assert!(matches!(error, RecipeError::Validation(_)));
    }

    #[test]
    fn addon_pair_serializes_as_flat_keys() {
        let mut recipe = sample();
        recipe.addon = Some(RecipeAddon {
            name: "KubeJS Create".to_string(),
            url: "https://kubejs.com/wiki/addons/kubejs-create".to_string(),
        });
        let value = serde_json::to_value(&recipe).expect("serialize");
        assert_eq!(value["type"], "shaped");
        assert_eq!(value["addon"], "KubeJS Create");
        assert_eq!(
            value["addon_url"],
            "https://kubejs.com/wiki/addons/kubejs-create"
        );

        let plain = serde_json::to_value(sample()).expect("serialize");
        assert!(plain.get("addon").is_none());
        assert!(plain.get("addon_url").is_none());
    }

    #[test]
    fn half_addon_pair_loads_as_absent() {
        let json = r#"{"type":"shaped","output":"x","ingredients":["a"],"addon":"Lonely"}"#;
        let recipe: Recipe = serde_json::from_str(json).expect("parse");
        assert!(recipe.addon.is_none());
    }

    #[test]
    fn blank_patch_changes_nothing() {
        let mut recipe = sample();
        let patch = RecipePatch {
            kind: Some("  ".to_string()),
            output: Some(String::new()),
            ingredients: Some(" , ".to_string()),
        };
        assert!(patch.is_blank());
        patch.apply(&mut recipe);
        assert_eq!(recipe, sample());
    }

    #[test]
    fn patch_overwrites_provided_fields_only() {
        let mut recipe = sample();
        RecipePatch {
            kind: None,
            output: Some(" minecraft:gold_block ".to_string()),
            ingredients: None,
        }
        .apply(&mut recipe);
        assert_eq!(recipe.kind, "shaped");
        assert_eq!(recipe.output, "minecraft:gold_block");
        assert_eq!(recipe.ingredients, vec!["minecraft:iron_ingot".to_string()]);
    }
}

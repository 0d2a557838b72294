use serde::{Deserialize, Deserializer, Serialize};

/// A recipe as returned by the recipe-search service.
///
/// Only `id` and `title` are guaranteed; every other field is optional and
/// depends on which endpoint produced the value and which flags the request
/// carried. The same shape is stored verbatim as a favorite snapshot, so a
/// recipe read back from the account store compares equal to the one that
/// was saved. Lists decode empty as `None`, since the account database
/// does not keep empty arrays.
///
/// # Examples
///
/// ```
/// # use recipe_discovery::Recipe;
/// let recipe: Recipe = serde_json::from_str(r#"{"id": 7, "title": "Soup"}"#)?;
/// assert_eq!(recipe.id, 7);
/// assert!(recipe.cuisines.is_none());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recipe {
    pub id: i64,
    pub title: String,
    pub image: Option<String>,
    pub image_type: Option<String>,
    pub servings: Option<u32>,
    pub ready_in_minutes: Option<u32>,
    pub cooking_minutes: Option<u32>,
    pub preparation_minutes: Option<u32>,
    pub license: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub spoonacular_source_url: Option<String>,
    pub health_score: Option<f64>,
    pub spoonacular_score: Option<f64>,
    pub price_per_serving: Option<f64>,
    #[serde(deserialize_with = "empty_as_none")]
    pub analyzed_instructions: Option<Vec<Instruction>>,
    pub cheap: Option<bool>,
    pub credits_text: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub cuisines: Option<Vec<String>>,
    pub dairy_free: Option<bool>,
    #[serde(deserialize_with = "empty_as_none")]
    pub diets: Option<Vec<String>>,
    pub gaps: Option<String>,
    pub gluten_free: Option<bool>,
    pub instructions: Option<String>,
    pub ketogenic: Option<bool>,
    pub low_fodmap: Option<bool>,
    #[serde(deserialize_with = "empty_as_none")]
    pub occasions: Option<Vec<String>>,
    pub sustainable: Option<bool>,
    pub vegan: Option<bool>,
    pub vegetarian: Option<bool>,
    pub very_healthy: Option<bool>,
    pub very_popular: Option<bool>,
    pub whole30: Option<bool>,
    pub weight_watcher_smart_points: Option<u32>,
    #[serde(deserialize_with = "empty_as_none")]
    pub dish_types: Option<Vec<String>>,
    #[serde(deserialize_with = "empty_as_none")]
    pub extended_ingredients: Option<Vec<Ingredient>>,
    pub summary: Option<String>,
    pub wine_pairing: Option<WinePairing>,
    pub nutrition: Option<Nutrition>,
}

impl Recipe {
    /// Returns one display line per ingredient.
    ///
    /// Uses the ingredient's original text when the service supplied it,
    /// falling back to its bare name.
    pub fn ingredient_lines(&self) -> Vec<String> {
        self.extended_ingredients
            .iter()
            .flatten()
            .map(|ingredient| {
                ingredient
                    .original
                    .clone()
                    .unwrap_or_else(|| ingredient.name.clone())
            })
            .collect()
    }

    /// Returns the text of every instruction step, across all instruction
    /// groups, in order.
    pub fn step_texts(&self) -> Vec<String> {
        self.analyzed_instructions
            .iter()
            .flatten()
            .flat_map(|group| group.steps.iter().flatten())
            .map(|step| step.step.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Instruction {
    pub name: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub steps: Option<Vec<Step>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Step {
    pub number: u32,
    pub step: String,
    #[serde(deserialize_with = "empty_as_none")]
    pub ingredients: Option<Vec<Ingredient>>,
    #[serde(deserialize_with = "empty_as_none")]
    pub equipment: Option<Vec<Equipment>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Equipment {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub localized_name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ingredient {
    pub id: i64,
    pub aisle: Option<String>,
    pub amount: Option<f64>,
    pub consistency: Option<String>,
    pub image: Option<String>,
    pub measures: Option<Measures>,
    #[serde(deserialize_with = "empty_as_none")]
    pub meta: Option<Vec<String>>,
    pub name: String,
    pub original: Option<String>,
    pub original_name: Option<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Measures {
    pub metric: Option<Measure>,
    pub us: Option<Measure>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Measure {
    pub amount: f64,
    pub unit_long: String,
    pub unit_short: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WinePairing {
    pub paired_wines: Vec<String>,
    pub pairing_text: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub product_matches: Option<Vec<ProductMatch>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductMatch {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<String>,
    pub image_url: Option<String>,
    pub average_rating: Option<f64>,
    pub rating_count: Option<f64>,
    pub score: Option<f64>,
    pub link: Option<String>,
}

/// Headline nutrition figures for one serving.
///
/// The service reports nutrition as a list of named nutrients; stored
/// snapshots keep only the four headline figures. Both shapes deserialize
/// into this type, and it always serializes to the compact shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "NutritionWire")]
pub struct Nutrition {
    pub calories: Option<f64>,
    pub fat: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
}

/// A single named nutrient from the service's nutrition breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nutrient {
    pub name: String,
    pub amount: f64,
    #[serde(default)]
    pub unit: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NutritionWire {
    Breakdown { nutrients: Vec<Nutrient> },
    Summary {
        #[serde(default)]
        calories: Option<f64>,
        #[serde(default)]
        fat: Option<f64>,
        #[serde(default)]
        protein: Option<f64>,
        #[serde(default)]
        carbs: Option<f64>,
    },
}

impl From<NutritionWire> for Nutrition {
    fn from(wire: NutritionWire) -> Self {
        match wire {
            NutritionWire::Breakdown { nutrients } => Nutrition::from_nutrients(&nutrients),
            NutritionWire::Summary {
                calories,
                fat,
                protein,
                carbs,
            } => Nutrition {
                calories,
                fat,
                protein,
                carbs,
            },
        }
    }
}

impl Nutrition {
    /// Folds a nutrient breakdown into the headline figures, matching
    /// nutrients by their exact name.
    pub fn from_nutrients(nutrients: &[Nutrient]) -> Self {
        let amount_of = |name: &str| {
            nutrients
                .iter()
                .find(|nutrient| nutrient.name == name)
                .map(|nutrient| nutrient.amount)
        };

        Nutrition {
            calories: amount_of("Calories"),
            fat: amount_of("Fat"),
            protein: amount_of("Protein"),
            carbs: amount_of("Carbohydrates"),
        }
    }
}

/// Reads an absent, `null` or empty list as `None`.
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let list = Option::<Vec<T>>::deserialize(deserializer)?;
    Ok(list.filter(|list| !list.is_empty()))
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipePage {
    pub results: Vec<Recipe>,
    pub offset: u32,
    pub number: u32,
    pub total_results: u32,
}

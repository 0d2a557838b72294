//! Recipe search filters and their query-string encoding.

mod model;

pub use model::{RandomFilters, SearchFilters};

/// A list of query parameters, in the order they are sent.
pub type QueryPairs = Vec<(&'static str, String)>;

impl SearchFilters {
    /// Encodes the set filters as query parameters.
    ///
    /// List filters are joined with commas. Nothing is emitted for an unset
    /// filter, so the service applies its own default.
    pub fn to_query(&self) -> QueryPairs {
        let mut pairs = QueryPairs::new();
        push_text(&mut pairs, "query", &self.query);
        push_text(&mut pairs, "cuisine", &self.cuisine);
        push_text(&mut pairs, "excludeCuisine", &self.exclude_cuisine);
        push_text(&mut pairs, "diet", &self.diet);
        push_list(&mut pairs, "intolerances", &self.intolerances);
        push_list(&mut pairs, "equipment", &self.equipment);
        push_list(&mut pairs, "includeIngredients", &self.include_ingredients);
        push_list(&mut pairs, "excludeIngredients", &self.exclude_ingredients);
        push_text(&mut pairs, "type", &self.dish_type);
        push_number(&mut pairs, "maxReadyTime", self.max_ready_time);
        push_number(&mut pairs, "minServings", self.min_servings);
        push_number(&mut pairs, "maxServings", self.max_servings);
        push_number(&mut pairs, "minCalories", self.min_calories);
        push_number(&mut pairs, "maxCalories", self.max_calories);
        push_text(&mut pairs, "sort", &self.sort);
        push_text(&mut pairs, "sortDirection", &self.sort_direction);
        push_number(&mut pairs, "offset", self.offset);
        push_number(&mut pairs, "number", self.number);
        pairs
    }
}

impl RandomFilters {
    /// Encodes the set filters as query parameters.
    pub fn to_query(&self) -> QueryPairs {
        let mut pairs = QueryPairs::new();
        push_list(&mut pairs, "include-tags", &self.include_tags);
        push_list(&mut pairs, "exclude-tags", &self.exclude_tags);
        push_number(&mut pairs, "number", self.number);
        pairs
    }
}

fn push_text(pairs: &mut QueryPairs, key: &'static str, value: &Option<String>) {
    if let Some(value) = value {
        pairs.push((key, value.clone()));
    }
}

fn push_list(pairs: &mut QueryPairs, key: &'static str, values: &[String]) {
    if !values.is_empty() {
        pairs.push((key, values.join(",")));
    }
}

fn push_number(pairs: &mut QueryPairs, key: &'static str, value: Option<u32>) {
    if let Some(value) = value {
        pairs.push((key, value.to_string()));
    }
}

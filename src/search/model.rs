/// Filters for a complex recipe search.
///
/// Every filter is optional. Unset scalar filters and empty list filters are
/// left out of the request entirely; the service treats an explicit empty
/// value differently from an absent one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub query: Option<String>,
    pub cuisine: Option<String>,
    pub exclude_cuisine: Option<String>,
    pub diet: Option<String>,
    pub intolerances: Vec<String>,
    pub equipment: Vec<String>,
    pub include_ingredients: Vec<String>,
    pub exclude_ingredients: Vec<String>,
    pub dish_type: Option<String>,
    pub max_ready_time: Option<u32>,
    pub min_servings: Option<u32>,
    pub max_servings: Option<u32>,
    pub min_calories: Option<u32>,
    pub max_calories: Option<u32>,
    pub sort: Option<String>,
    pub sort_direction: Option<String>,
    pub offset: Option<u32>,
    pub number: Option<u32>,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_cuisine(mut self, cuisine: impl Into<String>) -> Self {
        self.cuisine = Some(cuisine.into());
        self
    }

    pub fn with_diet(mut self, diet: impl Into<String>) -> Self {
        self.diet = Some(diet.into());
        self
    }

    pub fn with_intolerances<I, S>(mut self, intolerances: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.intolerances = intolerances.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_included_ingredients<I, S>(mut self, ingredients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_ingredients = ingredients.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_excluded_ingredients<I, S>(mut self, ingredients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_ingredients = ingredients.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_ready_time(mut self, minutes: u32) -> Self {
        self.max_ready_time = Some(minutes);
        self
    }

    pub fn with_servings(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.min_servings = min;
        self.max_servings = max;
        self
    }

    pub fn with_calories(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.min_calories = min;
        self.max_calories = max;
        self
    }

    pub fn with_page(mut self, offset: u32, number: u32) -> Self {
        self.offset = Some(offset);
        self.number = Some(number);
        self
    }
}

/// Filters for the random-recipes endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RandomFilters {
    pub number: Option<u32>,
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
}

impl RandomFilters {
    pub fn new(number: u32) -> Self {
        RandomFilters {
            number: Some(number),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.include_tags.push(tag.into());
        self
    }

    pub fn without_tag(mut self, tag: impl Into<String>) -> Self {
        self.exclude_tags.push(tag.into());
        self
    }
}

use crate::model::Recipe;

/// Builds the single prompt sent for one question about a recipe.
///
/// The recipe's title, ingredients, steps, ready time and servings are
/// inlined ahead of the question. Nothing from earlier turns is included.
pub fn build_prompt(recipe: &Recipe, question: &str, answer_language: &str) -> String {
    let ingredients = recipe.ingredient_lines().join(", ");
    let steps = recipe.step_texts().join(" ");
    let ready_time = recipe
        .ready_in_minutes
        .map(|minutes| format!("{minutes} minutes"))
        .unwrap_or_else(|| "unknown".to_string());
    let servings = recipe
        .servings
        .map(|servings| servings.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        "Recipe: {title}\n\
         Ingredients: {ingredients}\n\
         Instructions: {steps}\n\
         Preparation time: {ready_time}\n\
         Servings: {servings}\n\
         \n\
         Question: {question}\n\
         Answer in {answer_language}, briefly and accurately.",
        title = recipe.title,
        question = question.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ingredient, Instruction, Step};

    #[test]
    fn test_prompt_inlines_recipe_fields() {
        let recipe = Recipe {
            id: 3,
            title: "Pho".into(),
            ready_in_minutes: Some(90),
            servings: Some(4),
            extended_ingredients: Some(vec![
                Ingredient {
                    name: "beef bones".into(),
                    original: Some("1 kg beef bones".into()),
                    ..Default::default()
                },
                Ingredient {
                    name: "star anise".into(),
                    ..Default::default()
                },
            ]),
            analyzed_instructions: Some(vec![Instruction {
                name: None,
                steps: Some(vec![
                    Step {
                        number: 1,
                        step: "Roast the bones.".into(),
                        ..Default::default()
                    },
                    Step {
                        number: 2,
                        step: "Simmer for hours.".into(),
                        ..Default::default()
                    },
                ]),
            }]),
            ..Default::default()
        };

        let prompt = build_prompt(&recipe, "  Can I use chicken?  ", "Vietnamese");
        assert!(prompt.starts_with("Recipe: Pho\n"));
        assert!(prompt.contains("Ingredients: 1 kg beef bones, star anise\n"));
        assert!(prompt.contains("Instructions: Roast the bones. Simmer for hours.\n"));
        assert!(prompt.contains("Preparation time: 90 minutes\n"));
        assert!(prompt.contains("Servings: 4\n"));
        assert!(prompt.contains("Question: Can I use chicken?\n"));
        assert!(prompt.ends_with("Answer in Vietnamese, briefly and accurately."));
    }

    #[test]
    fn test_prompt_with_sparse_recipe() {
        let recipe = Recipe {
            id: 1,
            title: "Mystery".into(),
            ..Default::default()
        };
        let prompt = build_prompt(&recipe, "What is it?", "English");
        assert!(prompt.contains("Ingredients: \n"));
        assert!(prompt.contains("Preparation time: unknown\n"));
        assert!(prompt.contains("Servings: unknown\n"));
    }
}

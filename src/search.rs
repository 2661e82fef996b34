use crate::model::Recipe;

const DIFFICULTIES: &[(&str, &str)] = &[
    ("Easy", "Beginner"),
    ("Medium", "Intermediate"),
    ("Hard", "Expert"),
];

const MEAL_KEYWORDS: &[&str] = &[
    "Dinner",
    "Lunch",
    "Snack",
    "Dessert",
    "Side",
    "Appetizer",
    "Beverage",
];

// Plural display forms, used only when the query equals the keyword.
const MEAL_LABELS: &[(&str, &str)] = &[
    ("Snack", "Snacks"),
    ("Dessert", "Desserts"),
    ("Beverage", "Beverages"),
    ("Side", "Side Dishes"),
    ("Appetizer", "Appetizers"),
];

const CUISINE_GROUPS: &[(&str, Option<&str>, &[&str])] = &[
    (
        "Hispanic",
        Some("American and Hispanic"),
        &[
            "Spanish",
            "Cocktail",
            "Smoothie",
            "Hawaiian",
            "Mexican",
            "Brazilian",
        ],
    ),
    ("European", None, &["Italian", "Greek", "Russian"]),
    (
        "Asian",
        None,
        &["Asian", "Japanese", "Korean", "Thai", "Vietnamese"],
    ),
    (
        "Middleeast",
        Some("Middle Eastern and South Asian"),
        &[
            "Indian",
            "Pakistani",
            "Turkish",
            "Lebanese",
            "Moroccan",
            "Mediterranean",
        ],
    ),
];

/// What a query is asking for, resolved once before filtering.
#[derive(Debug)]
enum SearchIntent {
    Difficulty {
        label: &'static str,
    },
    MealType,
    CuisineGroup {
        cuisines: &'static [&'static str],
        label: Option<&'static str>,
    },
    FreeText,
}

/// A classified search query. Filtering is a pure per-recipe predicate, so a
/// recipe can never appear twice and results keep their original order.
#[derive(Debug)]
pub struct SearchQuery {
    original: String,
    formatted: String,
    intent: SearchIntent,
}

impl SearchQuery {
    /// Capitalizes the first letter and classifies the query. `None` for the
    /// empty string.
    pub fn parse(raw: &str) -> Option<SearchQuery> {
        let mut chars = raw.chars();
        let first = chars.next()?;
        let formatted: String = first.to_uppercase().chain(chars).collect();

        let intent = if let Some(&(_, label)) =
            DIFFICULTIES.iter().find(|(level, _)| *level == formatted)
        {
            SearchIntent::Difficulty { label }
        } else if MEAL_KEYWORDS.iter().any(|k| formatted.contains(k)) {
            SearchIntent::MealType
        } else if let Some(&(_, label, cuisines)) =
            CUISINE_GROUPS.iter().find(|(group, _, _)| *group == formatted)
        {
            SearchIntent::CuisineGroup { cuisines, label }
        } else {
            SearchIntent::FreeText
        };

        Some(SearchQuery {
            original: raw.to_owned(),
            formatted,
            intent,
        })
    }

    /// The query as shown on the results page, with display relabeling
    /// applied (Easy → Beginner, Snack → Snacks, ...).
    pub fn label(&self) -> &str {
        match self.intent {
            SearchIntent::Difficulty { label } => label,
            SearchIntent::MealType => MEAL_LABELS
                .iter()
                .find(|(keyword, _)| *keyword == self.formatted)
                .map(|&(_, plural)| plural)
                .unwrap_or(&self.formatted),
            SearchIntent::CuisineGroup { label, .. } => label.unwrap_or(&self.formatted),
            SearchIntent::FreeText => &self.formatted,
        }
    }

    pub fn matches(&self, recipe: &Recipe) -> bool {
        match &self.intent {
            SearchIntent::Difficulty { .. } => recipe.difficulty == self.formatted,
            SearchIntent::MealType => recipe.meal_type.contains(&self.formatted),
            SearchIntent::CuisineGroup { cuisines, .. } => {
                cuisines.contains(&recipe.cuisine.as_str())
            }
            SearchIntent::FreeText => {
                recipe.name.contains(&self.formatted)
                    || recipe.ingredients.contains(&self.formatted)
                    || recipe.description.contains(&self.formatted)
                    || recipe.description.contains(&self.original)
            }
        }
    }

    /// Filters in original recipe order.
    pub fn filter<'r>(&self, recipes: &'r [(u64, Recipe)]) -> Vec<&'r (u64, Recipe)> {
        recipes.iter().filter(|(_, r)| self.matches(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(name: &str, difficulty: &str, cuisine: &str, meal_type: &str) -> Recipe {
        Recipe {
            name: name.to_owned(),
            description: format!("{} you will come back to", name),
            ingredients: "salt,pepper".to_owned(),
            instructions: crate::model::serialize_instructions("Cook;Serve"),
            prep_time: 5,
            cook_time: 15,
            servings: 2,
            difficulty: difficulty.to_owned(),
            cuisine: cuisine.to_owned(),
            calories: 250,
            tags: "Test".to_owned(),
            image: "https://example.com/img.png".to_owned(),
            rating: 4.0,
            review_count: 3,
            meal_type: meal_type.to_owned(),
        }
    }

    fn sample() -> Vec<(u64, Recipe)> {
        vec![
            (1, recipe("Margherita Pizza", "Easy", "Italian", "Dinner")),
            (2, recipe("Chicken Karahi", "Medium", "Pakistani", "Dinner, Lunch")),
            (3, recipe("Mango Smoothie", "Easy", "Smoothie", "Beverage")),
            (4, recipe("Beef Bulgogi", "Hard", "Korean", "Dinner")),
            (5, recipe("Churros", "Medium", "Spanish", "Dessert, Snack")),
        ]
    }

    #[test]
    fn difficulty_matches_exactly_and_relabels() {
        let recipes = sample();
        let query = SearchQuery::parse("easy").unwrap();
        assert_eq!(query.label(), "Beginner");
        let ids: Vec<u64> = query.filter(&recipes).iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(SearchQuery::parse("Medium").unwrap().label(), "Intermediate");
        assert_eq!(SearchQuery::parse("hard").unwrap().label(), "Expert");
    }

    #[test]
    fn meal_type_is_substring_match_with_plural_label() {
        let recipes = sample();
        let query = SearchQuery::parse("dinner").unwrap();
        assert_eq!(query.label(), "Dinner");
        let ids: Vec<u64> = query.filter(&recipes).iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2, 4]);

        let query = SearchQuery::parse("snack").unwrap();
        assert_eq!(query.label(), "Snacks");
        let ids: Vec<u64> = query.filter(&recipes).iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![5]);

        assert_eq!(SearchQuery::parse("side").unwrap().label(), "Side Dishes");
        assert_eq!(SearchQuery::parse("appetizer").unwrap().label(), "Appetizers");
        assert_eq!(SearchQuery::parse("beverage").unwrap().label(), "Beverages");
    }

    #[test]
    fn hispanic_group_is_cuisine_union() {
        let recipes = sample();
        let query = SearchQuery::parse("hispanic").unwrap();
        assert_eq!(query.label(), "American and Hispanic");
        let ids: Vec<u64> = query.filter(&recipes).iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![3, 5]);
    }

    #[test]
    fn other_cuisine_groups_keep_their_label() {
        let recipes = sample();
        let query = SearchQuery::parse("asian").unwrap();
        assert_eq!(query.label(), "Asian");
        let ids: Vec<u64> = query.filter(&recipes).iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![4]);
        assert_eq!(
            SearchQuery::parse("middleeast").unwrap().label(),
            "Middle Eastern and South Asian"
        );
    }

    #[test]
    fn free_text_searches_ingredients_once() {
        let mut recipes = sample();
        recipes[1].1.ingredients = "chicken,Garlic,ginger".to_owned();
        // "Garlic" appears in the ingredients only; the recipe shows up once.
        let query = SearchQuery::parse("garlic").unwrap();
        assert_eq!(query.label(), "Garlic");
        let ids: Vec<u64> = query.filter(&recipes).iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn free_text_tries_original_case_against_description() {
        let mut recipes = sample();
        recipes[0].1.description = "a pizza you will come back to".to_owned();
        let query = SearchQuery::parse("a pizza").unwrap();
        let ids: Vec<u64> = query.filter(&recipes).iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn empty_query_is_rejected() {
        assert!(SearchQuery::parse("").is_none());
    }
}

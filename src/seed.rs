use crate::database::RecipeDb;
use crate::model::{serialize_instructions, Recipe};
use async_trait::async_trait;
use log::info;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use thiserror::Error;

/// Number of recipes fetched from the external API.
pub const NUM_RECIPES: u32 = 50;

// Long names collapsed to shorter display names after insertion.
const NAME_UPDATES: &[(&str, &str)] = &[
    ("Pesto Pasta with Cherry Tomatoes", "Pesto Pasta with Tomatoes"),
    ("Japanese Matcha Green Tea Ice Cream", "Matcha Green Tea Ice Cream"),
    ("Saag (Spinach) with Makki di Roti", "Spinach with Makki di Roti"),
];

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("recipe fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("data file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("data file ended before recipe {0}")]
    MissingLine(u32),
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
}

/// One recipe as served by the external API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeRecord {
    pub name: String,
    pub prep_time_minutes: u32,
    pub cook_time_minutes: u32,
    pub servings: u32,
    pub difficulty: String,
    pub cuisine: String,
    pub calories_per_serving: u32,
    pub tags: Vec<String>,
    pub image: String,
    pub rating: f64,
    pub review_count: u32,
    pub meal_type: Vec<String>,
}

#[async_trait(?Send)]
pub trait RecipeSource {
    async fn fetch(&self, index: u32) -> Result<RecipeRecord, SeedError>;
}

/// Fetches single recipes from `GET {base}/recipes/{index}`.
pub struct DummyJsonSource {
    client: reqwest::Client,
    base_url: String,
}

impl DummyJsonSource {
    pub fn new() -> DummyJsonSource {
        DummyJsonSource::with_base_url("https://dummyjson.com")
    }

    pub fn with_base_url<S: Into<String>>(base_url: S) -> DummyJsonSource {
        DummyJsonSource {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait(?Send)]
impl RecipeSource for DummyJsonSource {
    async fn fetch(&self, index: u32) -> Result<RecipeRecord, SeedError> {
        let url = format!("{}/recipes/{}", self.base_url, index);
        let record = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(record)
    }
}

/// Paths of the three line-oriented data files; line N belongs to recipe N.
#[derive(Debug, Clone)]
pub struct DataFiles {
    pub descriptions: PathBuf,
    pub ingredients: PathBuf,
    pub instructions: PathBuf,
}

/// Populates the recipe store. One row per distinct (post-rename) name, so
/// running this again over the same source changes nothing. Any failure
/// aborts the remaining batch; the caller decides whether to keep going with
/// a partially seeded store.
pub async fn initialize<S: RecipeSource>(
    db: &sled::Db,
    source: &S,
    files: &DataFiles,
) -> Result<(), SeedError> {
    db.create_tables()?;
    let mut descriptions = BufReader::new(File::open(&files.descriptions)?).lines();
    let mut ingredients = BufReader::new(File::open(&files.ingredients)?).lines();
    let mut instructions = BufReader::new(File::open(&files.instructions)?).lines();

    for index in 1..=NUM_RECIPES {
        let record = source.fetch(index).await?;
        let description = descriptions.next().ok_or(SeedError::MissingLine(index))??;
        let ingredient_line = ingredients.next().ok_or(SeedError::MissingLine(index))??;
        let instruction_line = instructions.next().ok_or(SeedError::MissingLine(index))??;
        insert_recipe(db, &record, description, ingredient_line, instruction_line)?;
        reformat_long_names(db, &record.name)?;
    }
    info!("recipe store seeded with up to {} recipes", NUM_RECIPES);
    Ok(())
}

fn final_name(name: &str) -> &str {
    NAME_UPDATES
        .iter()
        .find(|(old, _)| *old == name)
        .map(|(_, new)| *new)
        .unwrap_or(name)
}

fn insert_recipe(
    db: &sled::Db,
    record: &RecipeRecord,
    description: String,
    ingredients: String,
    instructions: String,
) -> Result<(), SeedError> {
    let recipe = Recipe {
        name: final_name(&record.name).to_owned(),
        description,
        ingredients,
        instructions: serialize_instructions(&instructions),
        prep_time: record.prep_time_minutes,
        cook_time: record.cook_time_minutes,
        servings: record.servings,
        difficulty: record.difficulty.clone(),
        cuisine: record.cuisine.clone(),
        calories: record.calories_per_serving,
        tags: record.tags.join(", "),
        image: record.image.clone(),
        rating: record.rating,
        review_count: record.review_count,
        meal_type: record.meal_type.join(", "),
    };
    // add_recipe skips the insert when a row already carries this name.
    db.add_recipe(&recipe)?;
    Ok(())
}

/// Moves rows that still carry one of the known long names over to the short
/// form. Rows inserted by this run already use the short name, so this only
/// touches leftovers from earlier versions of the store.
fn reformat_long_names(db: &sled::Db, fetched_name: &str) -> Result<(), SeedError> {
    if let Some((old, new)) = NAME_UPDATES.iter().find(|(old, _)| *old == fetched_name) {
        db.rename_recipe(old, new)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;

    struct FixedSource {
        records: Vec<RecipeRecord>,
    }

    #[async_trait(?Send)]
    impl RecipeSource for FixedSource {
        async fn fetch(&self, index: u32) -> Result<RecipeRecord, SeedError> {
            Ok(self.records[(index as usize - 1) % self.records.len()].clone())
        }
    }

    fn record(name: &str) -> RecipeRecord {
        RecipeRecord {
            name: name.to_owned(),
            prep_time_minutes: 10,
            cook_time_minutes: 20,
            servings: 4,
            difficulty: "Easy".to_owned(),
            cuisine: "Italian".to_owned(),
            calories_per_serving: 300,
            tags: vec!["Pasta".to_owned(), "Dinner".to_owned()],
            image: "https://example.com/img.png".to_owned(),
            rating: 4.6,
            review_count: 12,
            meal_type: vec!["Dinner".to_owned()],
        }
    }

    fn write_lines(dir: &Path, name: &str, count: usize) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        for i in 1..=count {
            writeln!(file, "{} line {}", name, i).unwrap();
        }
        path
    }

    fn test_files(test_name: &str, lines: usize) -> DataFiles {
        let dir = std::env::temp_dir().join(format!(
            "swiftrecipe-seed-{}-{}",
            test_name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        DataFiles {
            descriptions: write_lines(&dir, "descriptions.txt", lines),
            ingredients: write_lines(&dir, "ingredients.txt", lines),
            instructions: write_lines(&dir, "instructions.txt", lines),
        }
    }

    #[actix_rt::test]
    async fn seeding_twice_creates_no_duplicates() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let source = FixedSource {
            records: vec![
                record("Margherita Pizza"),
                record("Chicken Karahi"),
                record("Caprese Salad"),
            ],
        };
        let files = test_files("dedup", NUM_RECIPES as usize);
        initialize(&db, &source, &files).await.unwrap();
        assert_eq!(db.all_recipes().unwrap().len(), 3);
        initialize(&db, &source, &files).await.unwrap();
        assert_eq!(db.all_recipes().unwrap().len(), 3);
    }

    #[actix_rt::test]
    async fn long_names_are_collapsed_idempotently() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let source = FixedSource {
            records: vec![
                record("Pesto Pasta with Cherry Tomatoes"),
                record("Japanese Matcha Green Tea Ice Cream"),
            ],
        };
        let files = test_files("rename", NUM_RECIPES as usize);
        initialize(&db, &source, &files).await.unwrap();
        initialize(&db, &source, &files).await.unwrap();
        assert!(db
            .get_recipe_by_name("Pesto Pasta with Cherry Tomatoes")
            .unwrap()
            .is_none());
        let matches: Vec<_> = db
            .all_recipes()
            .unwrap()
            .into_iter()
            .filter(|(_, r)| r.name == "Pesto Pasta with Tomatoes")
            .collect();
        assert_eq!(matches.len(), 1);
        assert!(db
            .get_recipe_by_name("Matcha Green Tea Ice Cream")
            .unwrap()
            .is_some());
    }

    #[actix_rt::test]
    async fn short_data_file_aborts_the_batch() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let source = FixedSource {
            records: vec![record("Margherita Pizza")],
        };
        let files = test_files("short", 10);
        match initialize(&db, &source, &files).await {
            Err(SeedError::MissingLine(index)) => assert_eq!(index, 11),
            other => panic!("expected MissingLine, got {:?}", other),
        }
        // The first ten rows were merged before the batch died, but only one
        // name was distinct.
        assert_eq!(db.all_recipes().unwrap().len(), 1);
    }

    #[test]
    fn record_parses_api_shape() {
        let json = r#"{
            "id": 1,
            "name": "Classic Margherita Pizza",
            "ingredients": ["Pizza dough", "Tomato sauce"],
            "prepTimeMinutes": 20,
            "cookTimeMinutes": 15,
            "servings": 4,
            "difficulty": "Easy",
            "cuisine": "Italian",
            "caloriesPerServing": 300,
            "tags": ["Pizza", "Italian"],
            "userId": 45,
            "image": "https://cdn.dummyjson.com/recipe-images/1.webp",
            "rating": 4.6,
            "reviewCount": 3,
            "mealType": ["Dinner"]
        }"#;
        let record: RecipeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.name, "Classic Margherita Pizza");
        assert_eq!(record.tags.join(", "), "Pizza, Italian");
        assert_eq!(record.meal_type.join(", "), "Dinner");
    }
}

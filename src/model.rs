use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Recipe {
    pub name: String,
    pub description: String,
    pub ingredients: String,
    /// Instruction text as an opaque serialized blob, split on `;` for display.
    pub instructions: Vec<u8>,
    pub prep_time: u32,
    pub cook_time: u32,
    pub servings: u32,
    pub difficulty: String,
    pub cuisine: String,
    pub calories: u32,
    pub tags: String,
    pub image: String,
    pub rating: f64,
    pub review_count: u32,
    pub meal_type: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

pub fn serialize_instructions(instructions: &str) -> Vec<u8> {
    bincode::serialize(instructions).unwrap()
}

pub fn deserialize_instructions(blob: &[u8]) -> bincode::Result<String> {
    bincode::deserialize(blob)
}

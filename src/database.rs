use crate::model::*;
use sled::transaction::{TransactionError, Transactional};

// Ids are stored big-endian so that iterating a tree yields records in
// insertion order (the dashboard and search rely on this).
fn serialize_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> u64 {
    use std::convert::TryInto;
    u64::from_be_bytes(id.as_ref()[..8].try_into().unwrap())
}

const RECIPES: &'static [u8] = b"recipes";
const RECIPES_NAME: &'static [u8] = b"recipes_name";
const USERS: &'static [u8] = b"users";
const USERS_USERNAME: &'static [u8] = b"users_username";
const USERS_EMAIL: &'static [u8] = b"users_email";
const USER_RECIPE: &'static [u8] = b"user_recipe";

/// Key of the user↔recipe join tree: user id followed by recipe id.
fn join_key(user_id: u64, recipe_id: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&serialize_id(user_id));
    key[8..].copy_from_slice(&serialize_id(recipe_id));
    key
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateUser {
    Username,
    Email,
}

pub trait UserDb {
    type Error;
    /// Inserts a user, enforcing unique username and email in one transaction.
    fn add_user(&self, user: &User) -> Result<Result<u64, DuplicateUser>, Self::Error>;
    fn get_user(&self, id: u64) -> Result<Option<User>, Self::Error>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<(u64, User)>, Self::Error>;
    fn username_taken(&self, username: &str) -> Result<bool, Self::Error>;
    fn email_taken(&self, email: &str) -> Result<bool, Self::Error>;
    /// Records a saved recipe as an explicit join row, no embedded sets.
    fn save_recipe_for(&self, user_id: u64, recipe_id: u64) -> Result<(), Self::Error>;
    fn saved_recipes(&self, user_id: u64) -> Result<Vec<(u64, Recipe)>, Self::Error>;
}

pub trait RecipeDb {
    type Error;
    /// Ensures all trees exist. Safe to call more than once.
    fn create_tables(&self) -> Result<(), Self::Error>;
    /// Inserts a recipe unless one with the same name exists; `None` on a
    /// name collision.
    fn add_recipe(&self, recipe: &Recipe) -> Result<Option<u64>, Self::Error>;
    fn get_recipe(&self, id: u64) -> Result<Option<Recipe>, Self::Error>;
    fn get_recipe_by_name(&self, name: &str) -> Result<Option<(u64, Recipe)>, Self::Error>;
    /// All recipes in insertion order.
    fn all_recipes(&self) -> Result<Vec<(u64, Recipe)>, Self::Error>;
    /// Moves a recipe from `old_name` to `new_name` if a row with the old
    /// name still exists and the new name is free; returns whether a rename
    /// happened.
    fn rename_recipe(&self, old_name: &str, new_name: &str) -> Result<bool, Self::Error>;
}

impl UserDb for sled::Db {
    type Error = sled::Error;

    fn add_user(&self, user: &User) -> sled::Result<Result<u64, DuplicateUser>> {
        let users = self.open_tree(USERS)?;
        let users_username = self.open_tree(USERS_USERNAME)?;
        let users_email = self.open_tree(USERS_EMAIL)?;
        let id = self.generate_id()?;
        if let Err(err) = (&users, &users_username, &users_email).transaction(
            |(users, users_username, users_email)| {
                users.insert(&serialize_id(id), bincode::serialize(user).unwrap())?;
                if users_username
                    .insert(user.username.as_bytes(), &serialize_id(id))?
                    .is_some()
                {
                    sled::transaction::abort(DuplicateUser::Username)?;
                }
                if users_email
                    .insert(user.email.as_bytes(), &serialize_id(id))?
                    .is_some()
                {
                    sled::transaction::abort(DuplicateUser::Email)?;
                }
                Ok(())
            },
        ) {
            match err {
                TransactionError::Storage(e) => return Err(e),
                TransactionError::Abort(dup) => return Ok(Err(dup)),
            };
        }
        Ok(Ok(id))
    }

    fn get_user(&self, id: u64) -> sled::Result<Option<User>> {
        let users = self.open_tree(USERS)?;
        Ok(users
            .get(serialize_id(id))?
            .map(|d| bincode::deserialize(&d).unwrap()))
    }

    fn get_user_by_username(&self, username: &str) -> sled::Result<Option<(u64, User)>> {
        let users_username = self.open_tree(USERS_USERNAME)?;
        let users = self.open_tree(USERS)?;
        if let Some(id) = users_username.get(username)? {
            let user =
                bincode::deserialize(&users.get(&id)?.expect("Bad index users_username")).unwrap();
            Ok(Some((deserialize_id(id), user)))
        } else {
            Ok(None)
        }
    }

    fn username_taken(&self, username: &str) -> sled::Result<bool> {
        let users_username = self.open_tree(USERS_USERNAME)?;
        Ok(users_username.get(username)?.is_some())
    }

    fn email_taken(&self, email: &str) -> sled::Result<bool> {
        let users_email = self.open_tree(USERS_EMAIL)?;
        Ok(users_email.get(email)?.is_some())
    }

    fn save_recipe_for(&self, user_id: u64, recipe_id: u64) -> sled::Result<()> {
        let user_recipe = self.open_tree(USER_RECIPE)?;
        user_recipe.insert(&join_key(user_id, recipe_id), vec![])?;
        Ok(())
    }

    fn saved_recipes(&self, user_id: u64) -> sled::Result<Vec<(u64, Recipe)>> {
        let user_recipe = self.open_tree(USER_RECIPE)?;
        let recipes = self.open_tree(RECIPES)?;
        user_recipe
            .scan_prefix(&serialize_id(user_id))
            .map(|entry| {
                let (key, _) = entry?;
                let recipe_id = deserialize_id(&key[8..]);
                let recipe = bincode::deserialize(
                    &recipes
                        .get(&key[8..])?
                        .expect("Bad join user_recipe"),
                )
                .unwrap();
                Ok((recipe_id, recipe))
            })
            .collect()
    }
}

impl RecipeDb for sled::Db {
    type Error = sled::Error;

    fn create_tables(&self) -> sled::Result<()> {
        for name in &[
            RECIPES,
            RECIPES_NAME,
            USERS,
            USERS_USERNAME,
            USERS_EMAIL,
            USER_RECIPE,
        ] {
            self.open_tree(name)?;
        }
        Ok(())
    }

    fn add_recipe(&self, recipe: &Recipe) -> sled::Result<Option<u64>> {
        let recipes = self.open_tree(RECIPES)?;
        let recipes_name = self.open_tree(RECIPES_NAME)?;
        let id = self.generate_id()?;
        if let Err(err) = (&recipes, &recipes_name).transaction(|(recipes, recipes_name)| {
            recipes.insert(&serialize_id(id), bincode::serialize(recipe).unwrap())?;
            if recipes_name
                .insert(recipe.name.as_bytes(), &serialize_id(id))?
                .is_some()
            {
                sled::transaction::abort(())?;
            }
            Ok(())
        }) {
            match err {
                TransactionError::Storage(e) => return Err(e),
                TransactionError::Abort(()) => return Ok(None),
            };
        }
        Ok(Some(id))
    }

    fn get_recipe(&self, id: u64) -> sled::Result<Option<Recipe>> {
        let recipes = self.open_tree(RECIPES)?;
        Ok(recipes
            .get(serialize_id(id))?
            .map(|d| bincode::deserialize(&d).unwrap()))
    }

    fn get_recipe_by_name(&self, name: &str) -> sled::Result<Option<(u64, Recipe)>> {
        let recipes_name = self.open_tree(RECIPES_NAME)?;
        let recipes = self.open_tree(RECIPES)?;
        if let Some(id) = recipes_name.get(name)? {
            let recipe =
                bincode::deserialize(&recipes.get(&id)?.expect("Bad index recipes_name")).unwrap();
            Ok(Some((deserialize_id(id), recipe)))
        } else {
            Ok(None)
        }
    }

    fn all_recipes(&self) -> sled::Result<Vec<(u64, Recipe)>> {
        let recipes = self.open_tree(RECIPES)?;
        recipes
            .iter()
            .map(|entry| {
                let (key, value) = entry?;
                Ok((deserialize_id(key), bincode::deserialize(&value).unwrap()))
            })
            .collect()
    }

    fn rename_recipe(&self, old_name: &str, new_name: &str) -> sled::Result<bool> {
        let recipes = self.open_tree(RECIPES)?;
        let recipes_name = self.open_tree(RECIPES_NAME)?;
        let new_name = new_name.to_owned();
        (&recipes, &recipes_name)
            .transaction(
                move |(recipes, recipes_name)| -> sled::transaction::ConflictableTransactionResult<bool, ()> {
                    let id = match recipes_name.remove(old_name.as_bytes())? {
                        Some(id) => id,
                        None => return Ok(false),
                    };
                    if recipes_name.get(new_name.as_bytes())?.is_some() {
                        // The short name is already taken; keep the old row
                        // untouched so names stay unique.
                        recipes_name.insert(old_name.as_bytes(), id)?;
                        return Ok(false);
                    }
                    let mut recipe: Recipe = bincode::deserialize(
                        &recipes.get(&id)?.expect("Bad index recipes_name"),
                    )
                    .unwrap();
                    recipe.name = new_name.clone();
                    recipes.insert(id.clone(), bincode::serialize(&recipe).unwrap())?;
                    recipes_name.insert(new_name.as_bytes(), id.clone())?;
                    Ok(true)
                },
            )
            .map_err(|e| match e {
                TransactionError::Storage(s) => s,
                TransactionError::Abort(()) => unreachable!(),
            })
    }
}

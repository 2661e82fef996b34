mod config;
mod database;
mod model;
mod search;
mod seed;

use actix_identity::{CookieIdentityPolicy, Identity, IdentityService};
use actix_web::{error, middleware::Logger, web, App, HttpResponse, HttpServer};
use database::*;
use lazy_static::lazy_static;
use log::debug;
use model::*;
use regex::Regex;
use search::SearchQuery;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

type Tera = web::Data<tera::Tera>;
type Db = web::Data<sled::Db>;

fn log_error<E: std::fmt::Debug>(err: E, message: &'static str) -> error::Error {
    debug!("{:?}", err);
    error::ErrorInternalServerError(message)
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found().header("location", location).finish()
}

/// The logged-in user, if any. Sessions naming a user that no longer exists
/// count as logged out.
fn current_user(id: &Identity, db: &sled::Db) -> actix_web::Result<Option<(u64, User)>> {
    match id.identity() {
        Some(username) => db
            .get_user_by_username(&username)
            .map_err(|err| log_error(err, "Database error")),
        None => Ok(None),
    }
}

/// A recipe together with its id, the shape the templates work with.
#[derive(Serialize)]
struct RecipeEntry {
    id: u64,
    #[serde(flatten)]
    recipe: Recipe,
}

fn entries(recipes: Vec<(u64, Recipe)>) -> Vec<RecipeEntry> {
    recipes
        .into_iter()
        .map(|(id, recipe)| RecipeEntry { id, recipe })
        .collect()
}

async fn dashboard(id: Identity, tera: Tera, db: Db) -> actix_web::Result<HttpResponse> {
    let (_user_id, user) = match current_user(&id, &db)? {
        Some(user) => user,
        None => return Ok(redirect("/login")),
    };
    let recipes = db
        .all_recipes()
        .map_err(|err| log_error(err, "Database error"))?;
    let mut ctx = tera::Context::new();
    ctx.insert("user", &user);
    ctx.insert("recipes", &entries(recipes));
    let body = tera
        .render("dashboard.html", &ctx)
        .map_err(|err| log_error(err, "Template error"))?;
    Ok(HttpResponse::Ok().body(body))
}

async fn categories(id: Identity, tera: Tera, db: Db) -> actix_web::Result<HttpResponse> {
    let (_user_id, user) = match current_user(&id, &db)? {
        Some(user) => user,
        None => return Ok(redirect("/login")),
    };
    let mut ctx = tera::Context::new();
    ctx.insert("user", &user);
    let body = tera
        .render("categories.html", &ctx)
        .map_err(|err| log_error(err, "Template error"))?;
    Ok(HttpResponse::Ok().body(body))
}

async fn saved(id: Identity, tera: Tera, db: Db) -> actix_web::Result<HttpResponse> {
    let (user_id, user) = match current_user(&id, &db)? {
        Some(user) => user,
        None => return Ok(redirect("/login")),
    };
    let mut saved = db
        .saved_recipes(user_id)
        .map_err(|err| log_error(err, "Database error"))?;
    let mut ctx = tera::Context::new();
    ctx.insert("user", &user);
    if saved.is_empty() {
        let body = tera
            .render("emptySaved.html", &ctx)
            .map_err(|err| log_error(err, "Template error"))?;
        return Ok(HttpResponse::Ok().body(body));
    }
    saved.sort_by(|a, b| a.1.name.cmp(&b.1.name));
    ctx.insert("savedRecipes", &entries(saved));
    let body = tera
        .render("saved.html", &ctx)
        .map_err(|err| log_error(err, "Template error"))?;
    Ok(HttpResponse::Ok().body(body))
}

#[derive(Deserialize)]
struct RecipeInfoParams {
    #[serde(rename = "recipeId")]
    recipe_id: u64,
}

async fn recipe_info(
    id: Identity,
    tera: Tera,
    db: Db,
    params: web::Query<RecipeInfoParams>,
) -> actix_web::Result<HttpResponse> {
    let (_user_id, user) = match current_user(&id, &db)? {
        Some(user) => user,
        None => return Ok(redirect("/login")),
    };
    let recipe = db
        .get_recipe(params.recipe_id)
        .map_err(|err| log_error(err, "Database error"))?
        .ok_or_else(|| {
            error::ErrorNotFound(format!(
                "The Recipe ID: '{}' does not exist in our records.",
                params.recipe_id
            ))
        })?;
    let instruction_text = deserialize_instructions(&recipe.instructions)
        .map_err(|err| log_error(err, "Corrupt instruction data"))?;
    let instructions: Vec<&str> = instruction_text.split(';').collect();
    let ingredients: Vec<&str> = recipe.ingredients.split(',').collect();
    let mut ctx = tera::Context::new();
    ctx.insert("user", &user);
    ctx.insert("recipe", &recipe);
    ctx.insert("recipeId", &params.recipe_id);
    ctx.insert("instructions", &instructions);
    ctx.insert("ingredients", &ingredients);
    let body = tera
        .render("recipeInfo.html", &ctx)
        .map_err(|err| log_error(err, "Template error"))?;
    Ok(HttpResponse::Ok().body(body))
}

#[derive(Deserialize)]
struct ResultsParams {
    query: String,
}

async fn results(
    id: Identity,
    tera: Tera,
    db: Db,
    params: web::Query<ResultsParams>,
) -> actix_web::Result<HttpResponse> {
    let (_user_id, user) = match current_user(&id, &db)? {
        Some(user) => user,
        None => return Ok(redirect("/login")),
    };
    let query = SearchQuery::parse(&params.query)
        .ok_or_else(|| error::ErrorBadRequest("Search query cannot be empty"))?;
    let recipes = db
        .all_recipes()
        .map_err(|err| log_error(err, "Database error"))?;
    let results: Vec<RecipeEntry> = recipes
        .into_iter()
        .filter(|(_, recipe)| query.matches(recipe))
        .map(|(id, recipe)| RecipeEntry { id, recipe })
        .collect();
    let mut ctx = tera::Context::new();
    ctx.insert("user", &user);
    ctx.insert("query", query.label());
    let template = if results.is_empty() {
        "emptyResults.html"
    } else {
        ctx.insert("results", &results);
        "results.html"
    };
    let body = tera
        .render(template, &ctx)
        .map_err(|err| log_error(err, "Template error"))?;
    Ok(HttpResponse::Ok().body(body))
}

#[derive(Deserialize)]
struct SaveRecipeForm {
    #[serde(rename = "recipeId")]
    recipe_id: u64,
}

async fn save_recipe(
    id: Identity,
    db: Db,
    form: web::Form<SaveRecipeForm>,
) -> actix_web::Result<HttpResponse> {
    let (user_id, _user) = match current_user(&id, &db)? {
        Some(user) => user,
        None => return Ok(redirect("/login")),
    };
    if db
        .get_recipe(form.recipe_id)
        .map_err(|err| log_error(err, "Database error"))?
        .is_some()
    {
        db.save_recipe_for(user_id, form.recipe_id)
            .map_err(|err| log_error(err, "Database error"))?;
    }
    Ok(redirect("/saved"))
}

async fn login(tera: Tera) -> actix_web::Result<HttpResponse> {
    let ctx = tera::Context::new();
    let body = tera
        .render("login.html", &ctx)
        .map_err(|err| log_error(err, "Template error"))?;
    Ok(HttpResponse::Ok().content_type("text/html").body(body))
}

#[derive(Serialize, Deserialize)]
struct LoginParams {
    username: String,
    password: String,
}

async fn login_post(
    params: web::Form<LoginParams>,
    id: Identity,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    if let Some((_user_id, user)) = db
        .get_user_by_username(&params.username)
        .map_err(|err| log_error(err, "Database error"))?
    {
        if bcrypt::verify(&params.password, &user.password_hash)
            .map_err(|err| log_error(err, "Verification error"))?
        {
            id.remember(user.username);
            return Ok(redirect("/"));
        }
    }
    Ok(redirect("/login?wrong_password"))
}

async fn logout(id: Identity) -> actix_web::Result<HttpResponse> {
    id.forget();
    Ok(redirect("/login?logout"))
}

#[derive(Serialize, Deserialize, Default)]
struct SignupForm {
    first_name: String,
    last_name: String,
    email: String,
    username: String,
    password: String,
}

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"(?i)^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,3}$").unwrap();
}

fn validate_signup(
    form: &SignupForm,
    db: &sled::Db,
) -> sled::Result<HashMap<&'static str, &'static str>> {
    let mut errors = HashMap::new();
    if form.first_name.trim().is_empty() {
        errors.insert("first_name", "First name cannot be blank");
    }
    if form.last_name.trim().is_empty() {
        errors.insert("last_name", "Last name cannot be blank");
    }
    if form.password.trim().is_empty() {
        errors.insert("password", "Password cannot be blank");
    }
    if form.email.trim().is_empty() {
        errors.insert("email", "Email address cannot be blank");
    } else if !EMAIL_RE.is_match(&form.email) {
        errors.insert("email", "Please enter a valid email");
    } else if db.email_taken(&form.email)? {
        errors.insert("email", "Email address is already registered");
    }
    if form.username.trim().is_empty() {
        errors.insert("username", "Username cannot be blank");
    } else if db.username_taken(&form.username)? {
        errors.insert("username", "Username is already taken");
    }
    Ok(errors)
}

async fn signup(tera: Tera) -> actix_web::Result<HttpResponse> {
    let mut ctx = tera::Context::new();
    ctx.insert("form", &SignupForm::default());
    ctx.insert("errors", &HashMap::<&str, &str>::new());
    let body = tera
        .render("signup.html", &ctx)
        .map_err(|err| log_error(err, "Template error"))?;
    Ok(HttpResponse::Ok().content_type("text/html").body(body))
}

async fn signup_user(
    form: web::Form<SignupForm>,
    tera: Tera,
    db: Db,
) -> actix_web::Result<HttpResponse> {
    let mut errors = validate_signup(&form, &db).map_err(|err| log_error(err, "Database error"))?;
    if errors.is_empty() {
        // Passwords are hashed at write time; plaintext never reaches the store.
        let password_hash = bcrypt::hash(&form.password, bcrypt::DEFAULT_COST)
            .map_err(|err| log_error(err, "Hashing error"))?;
        let user = User {
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            email: form.email.clone(),
            username: form.username.clone(),
            password_hash,
        };
        match db
            .add_user(&user)
            .map_err(|err| log_error(err, "Database error"))?
        {
            Ok(_user_id) => return Ok(redirect("/login")),
            Err(DuplicateUser::Username) => {
                errors.insert("username", "Username is already taken");
            }
            Err(DuplicateUser::Email) => {
                errors.insert("email", "Email address is already registered");
            }
        }
    }
    let mut ctx = tera::Context::new();
    ctx.insert("form", &*form);
    ctx.insert("errors", &errors);
    let body = tera
        .render("signup.html", &ctx)
        .map_err(|err| log_error(err, "Template error"))?;
    Ok(HttpResponse::Ok().content_type("text/html").body(body))
}

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "swiftrecipe=debug,actix_web=info");
    }
    env_logger::init();

    let config = config::Config::from_env();
    let db = sled::Config::new()
        .path(&config.db_path)
        .open()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;

    // One synchronous pass at startup; a failure leaves the store partially
    // seeded and the server starts anyway.
    if let Err(err) = seed::initialize(&db, &seed::DummyJsonSource::new(), &config.data_files).await
    {
        log::error!("recipe seeding aborted: {}", err);
    }

    let private_key = [0u8; 32];
    let bind_addr = config.bind_addr.clone();

    HttpServer::new(move || {
        let tera = tera::Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*")).unwrap();
        App::new()
            .wrap(Logger::default())
            .wrap(IdentityService::new(
                CookieIdentityPolicy::new(&private_key)
                    .name("auth-cookie")
                    .secure(false),
            ))
            .data(tera)
            .data(db.clone())
            .route("/", web::get().to(dashboard))
            .route("/login", web::get().to(login))
            .route("/login", web::post().to(login_post))
            .route("/logout", web::get().to(logout))
            .route("/signup", web::get().to(signup))
            .route("/signupUser", web::post().to(signup_user))
            .route("/categories", web::get().to(categories))
            .route("/saved", web::get().to(saved))
            .route("/recipeInfo", web::get().to(recipe_info))
            .route("/results", web::get().to(results))
            .route("/saveRecipe", web::post().to(save_recipe))
    })
    .bind(&bind_addr)?
    .run()
    .await
}

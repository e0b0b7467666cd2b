use crate::errors::{bad_request, conflict, ApiResult};
use crate::model::user::{
    CreateUserRequest, DetailedUser, NewUser, PublicUser, UpdateUserRequest, UserId, UserUpdate,
    UsernameQuery,
};
use crate::util::extractor::{Json, Query, ValidatedJson};
use crate::AppState;
use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use tracing::{info, warn};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/setup", post(setup))
        .route("/get-users", get(get_users))
        .route("/get-user", get(get_user))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/get-users", get(get_users_detailed))
        .route("/get-user", get(get_user_detailed))
        .route("/get-user-by-username", get(get_user_by_username))
        .route("/create-user", post(create_user))
        .route("/update-user", post(update_user))
        .route("/delete-user", post(delete_user))
}

/// Creates the first admin account. Needs no token and only works once.
async fn setup(State(state): State<AppState>, ValidatedJson(payload): ValidatedJson<CreateUserRequest>) -> ApiResult<Json<DetailedUser>> {
    let user = new_user(&state, payload).await?;

    match state.users.create_first_admin(&user).await? {
        Some(admin) => Ok(Json(DetailedUser::from(admin))),
        None => {
            warn!("setup refused for {:?}: an admin already exists", user.username);
            Err(conflict("There is already an admin user"))
        }
    }
}

async fn get_users(State(state): State<AppState>) -> ApiResult<Json<Vec<PublicUser>>> {
    let users = state.users.get_all().await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

async fn get_users_detailed(State(state): State<AppState>) -> ApiResult<Json<Vec<DetailedUser>>> {
    let users = state.users.get_all().await?;
    Ok(Json(users.into_iter().map(DetailedUser::from).collect()))
}

async fn get_user(State(state): State<AppState>, Query(query): Query<UserId>) -> ApiResult<Json<PublicUser>> {
    let user = state.users.find_by_id(query.id).await?;
    Ok(Json(PublicUser::from(user)))
}

async fn get_user_detailed(State(state): State<AppState>, Query(query): Query<UserId>) -> ApiResult<Json<DetailedUser>> {
    let user = state.users.find_by_id(query.id).await?;
    Ok(Json(DetailedUser::from(user)))
}

async fn get_user_by_username(State(state): State<AppState>, Query(query): Query<UsernameQuery>) -> ApiResult<Json<DetailedUser>> {
    let user = state.users.find_by_username(&query.username).await?;
    Ok(Json(DetailedUser::from(user)))
}

async fn create_user(State(state): State<AppState>, ValidatedJson(payload): ValidatedJson<CreateUserRequest>) -> ApiResult<Json<DetailedUser>> {
    let user = new_user(&state, payload).await?;
    let created = state.users.create(&user).await?;

    info!("user {:?} created", created.username);
    Ok(Json(DetailedUser::from(created)))
}

// Absent fields keep the stored values; `"email": null` clears the address.
async fn update_user(State(state): State<AppState>, ValidatedJson(payload): ValidatedJson<UpdateUserRequest>) -> ApiResult<Json<DetailedUser>> {
    let current = state.users.find_by_id(payload.id).await?;

    let email = payload.email.unwrap_or(current.email.clone());
    if let Some(address) = &email {
        if current.email.as_ref() != Some(address) && state.users.exists(address).await {
            return Err(conflict("The email address is already in use"));
        }
    }

    if let (Some(_), Some(old_password)) = (&payload.password, &payload.old_password) {
        if !state.passwords.verify(old_password, &current.password) {
            warn!("password change refused for {:?}: old password does not match", current.username);
            return Err(bad_request("Old password does not match"));
        }
    }

    let password_hash = payload
        .password
        .as_deref()
        .map(|password| state.passwords.hash(password))
        .transpose()?;

    let update = UserUpdate {
        id: current.id,
        name: payload.name.unwrap_or(current.name),
        email,
        password_hash,
        admin: payload.admin.unwrap_or(current.admin),
    };

    let user = state.users.update(&update).await?;
    Ok(Json(DetailedUser::from(user)))
}

async fn delete_user(State(state): State<AppState>, Json(payload): Json<UserId>) -> ApiResult<Json<DetailedUser>> {
    let user = state.users.delete(payload.id).await?;
    Ok(Json(DetailedUser::from(user)))
}

// Username and email must be free before anything is hashed.
async fn new_user(state: &AppState, payload: CreateUserRequest) -> ApiResult<NewUser> {
    if state.users.exists_username(&payload.username).await {
        return Err(conflict("The username is already in use"));
    }

    let email = payload.email;
    if let Some(address) = &email {
        if state.users.exists(address).await {
            return Err(conflict("The email address is already in use"));
        }
    }

    Ok(NewUser {
        name: payload.name,
        username: payload.username,
        email,
        password_hash: state.passwords.hash(&payload.password)?,
        admin: payload.admin,
    })
}


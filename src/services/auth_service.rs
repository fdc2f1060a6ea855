use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    audit,
    dto::auth::{Claims, LoginRequest, LoginResponse, RegisterRequest},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    models::{Role, User},
    response::{ApiResponse, Meta},
    state::{AppState, AuthSettings},
};

const MIN_PASSWORD_LEN: usize = 6;

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let RegisterRequest {
        name,
        email,
        password,
    } = payload;
    let name = name.trim().to_string();
    let email = normalize_email(&email);

    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest(
            "name, email and password are required".into(),
        ));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let exist = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(state.db())
        .await?;
    if exist.is_some() {
        return Err(AppError::Conflict("Email is already taken".into()));
    }

    let password_hash = hash_password(&password)?;

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set(Role::User.as_str().to_string()),
        created_at: NotSet,
    }
    .insert(state.db())
    .await
    .map_err(|err| AppError::conflict_on_unique(err, "Email is already taken"))?;

    audit::record(
        state.db(),
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(ApiResponse::success("User created", user_from_entity(user), None))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let user = Users::find()
        .filter(UserCol::Email.eq(normalize_email(&email)))
        .one(state.db())
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(invalid_credentials()),
    };

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(invalid_credentials());
    }

    let user = user_from_entity(user);
    let token = issue_token(&state.auth, &user)?;

    audit::record(
        state.db(),
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse { user, token },
        Some(Meta::empty()),
    ))
}

/// Sign a bearer token for `user` valid for the configured lifetime.
pub fn issue_token(settings: &AuthSettings, user: &User) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(settings.jwt_ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.as_str().to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        name: model.name,
        email: model.email,
        role: Role::parse(&model.role),
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid email or password".into())
}

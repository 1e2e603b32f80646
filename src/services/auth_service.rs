use axum::Extension;
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::db::entities::user;
use crate::web::error::AppError;
use crate::web::models::{
    AuthenticatedUser, Claims, LoginRequest, LoginResponse, RegisterRequest, UserResponse,
};

pub async fn register_user(
    pool: &DatabaseConnection,
    req: RegisterRequest,
) -> Result<UserResponse, AppError> {
    if req.username.trim().is_empty() || req.password.len() < 8 {
        return Err(AppError::InvalidInput(
            "Username must not be empty and the password needs at least 8 characters.".to_string(),
        ));
    }

    let existing = user::Entity::find()
        .filter(user::Column::Username.eq(&req.username))
        .one(pool)
        .await?;
    if existing.is_some() {
        return Err(AppError::UserAlreadyExists(
            "Username is already taken.".to_string(),
        ));
    }

    let password_hash = hash(&req.password, DEFAULT_COST)
        .map_err(|e| AppError::PasswordHashingError(e.to_string()))?;

    let now = Utc::now();
    let new_user = user::ActiveModel {
        username: Set(req.username.clone()),
        password_hash: Set(password_hash),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let user_model = new_user.insert(pool).await?;
    Ok(UserResponse {
        id: user_model.id,
        username: user_model.username,
    })
}

pub async fn login_user(
    pool: &DatabaseConnection,
    req: LoginRequest,
    jwt_secret: &str,
) -> Result<LoginResponse, AppError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidInput(
            "Username and password must not be empty.".to_string(),
        ));
    }

    let user = user::Entity::find()
        .filter(user::Column::Username.eq(&req.username))
        .one(pool)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let valid_password = verify(&req.password, &user.password_hash)
        .map_err(|e| AppError::InternalServerError(format!("Password verification failed: {e}")))?;

    if !valid_password {
        return Err(AppError::InvalidCredentials);
    }

    create_jwt_for_user(&user, jwt_secret)
}

pub fn create_jwt_for_user(
    user: &user::Model,
    jwt_secret: &str,
) -> Result<LoginResponse, AppError> {
    let now = Utc::now();
    // Token valid for 24 hours
    let expiration = (now + Duration::hours(24)).timestamp() as usize;

    let claims = Claims {
        sub: user.username.clone(),
        user_id: user.id,
        exp: expiration,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::TokenCreationError(e.to_string()))?;

    Ok(LoginResponse {
        token,
        user_id: user.id,
        username: user.username.clone(),
    })
}

pub async fn me(
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<axum::Json<UserResponse>, AppError> {
    Ok(axum::Json(UserResponse {
        id: user.id,
        username: user.username,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[tokio::test]
    async fn register_then_login_round_trip() {
        let db = test_db::connect().await;

        let user = register_user(
            &db,
            RegisterRequest {
                username: "operator".to_string(),
                password: "longenough".to_string(),
            },
        )
        .await
        .unwrap();

        let login = login_user(
            &db,
            LoginRequest {
                username: "operator".to_string(),
                password: "longenough".to_string(),
            },
            "secret",
        )
        .await
        .unwrap();
        assert_eq!(login.user_id, user.id);
        assert!(!login.token.is_empty());

        let err = login_user(
            &db,
            LoginRequest {
                username: "operator".to_string(),
                password: "wrong-password".to_string(),
            },
            "secret",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_usernames_are_rejected() {
        let db = test_db::connect().await;
        let req = RegisterRequest {
            username: "operator".to_string(),
            password: "longenough".to_string(),
        };
        register_user(&db, req).await.unwrap();

        let err = register_user(
            &db,
            RegisterRequest {
                username: "operator".to_string(),
                password: "longenough".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::UserAlreadyExists(_)));
    }
}

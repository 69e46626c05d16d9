use actix_web::{HttpRequest, HttpResponse, web};
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

use crate::{
    auth::{
        auth::bearer_token,
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    error::ApiError,
    models::{Claims, LoginReqDto, TokenPair, TokenType, UserSql},
    response::ApiResponse,
    utils::query_cache::{LOGIN_EVENT, QueryCache},
};

fn issue_pair(subject: &TokenSubject<'_>, config: &Config) -> Result<(TokenPair, Claims), ApiError> {
    let access_token = generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)
        .map_err(|e| {
            error!(error = %e, "Failed to sign access token");
            ApiError::Internal
        })?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl).map_err(
            |e| {
                error!(error = %e, "Failed to sign refresh token");
                ApiError::Internal
            },
        )?;

    Ok((
        TokenPair {
            access_token,
            refresh_token,
        },
        refresh_claims,
    ))
}

async fn store_refresh_token(pool: &MySqlPool, user_id: u64, claims: &Claims) -> Result<(), ApiError> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await
    .map_err(|e| {
        error!(error = %e, user_id, "Failed to store refresh token");
        ApiError::Internal
    })?;
    Ok(())
}

/// Exactly one live row must have been revoked; anything else means the
/// token is unknown or was already used.
fn ensure_rotated(rows_affected: u64) -> Result<(), ApiError> {
    if rows_affected == 1 {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("Refresh token revoked".to_string()))
    }
}

/// Log in with e-mail and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = Object, example = json!({
            "statusCode": 200,
            "data": {"access_token": "eyJ...", "refresh_token": "eyJ..."},
            "message": "Login successful"
        })),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, cache, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    cache: web::Data<QueryCache>,
) -> Result<HttpResponse, ApiError> {
    info!("Login request received");

    let username = user.username.trim().to_lowercase();
    if username.is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(ApiError::BadRequest("Username or password required".to_string()));
    }

    debug!("Fetching user from database");

    let db_user = sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, username, password, role_id, branch_code, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(&username)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Database error while fetching user");
        ApiError::Internal
    })?;

    let db_user = match db_user {
        Some(u) if u.is_active => u,
        Some(_) => {
            info!("Invalid credentials: account disabled");
            return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
        }
        None => {
            info!("Invalid credentials: user not found");
            return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    debug!(user_id = db_user.id, "Password verified, issuing tokens");

    let subject = TokenSubject {
        user_id: db_user.id,
        username: &db_user.username,
        role: db_user.role_id,
        branch_code: db_user.branch_code.as_deref(),
    };
    let (pair, refresh_claims) = issue_pair(&subject, &config)?;

    store_refresh_token(pool.get_ref(), db_user.id, &refresh_claims).await?;

    // Login bookkeeping is non-fatal
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = CURRENT_TIMESTAMP(3) WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    match sqlx::query("INSERT INTO employee_login_details (user_id, login_time) VALUES (?, ?)")
        .bind(db_user.id)
        .bind(chrono::Utc::now())
        .execute(pool.get_ref())
        .await
    {
        Ok(_) => cache.invalidate(LOGIN_EVENT),
        Err(e) => error!(error = %e, "Failed to record login event"),
    }

    info!("Login successful");

    Ok(ApiResponse::ok(pair, "Login successful"))
}

/// Rotate a refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair issued"),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let token = bearer_token(&req).ok_or_else(|| ApiError::Unauthorized("No token".to_string()))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::Unauthorized("Refresh token required".to_string()));
    }

    // revoke-and-check in one statement so a token is redeemable exactly once
    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE jti = ? AND user_id = ? AND revoked = FALSE
        "#,
    )
    .bind(&claims.jti)
    .bind(claims.user_id)
    .execute(pool.get_ref())
    .await?;

    ensure_rotated(result.rows_affected())?;
    let user_id = claims.user_id;

    let subject = TokenSubject {
        user_id,
        username: &claims.sub,
        role: claims.role,
        branch_code: claims.branch_code.as_deref(),
    };
    let (pair, new_claims) = issue_pair(&subject, &config)?;

    store_refresh_token(pool.get_ref(), user_id, &new_claims).await?;

    Ok(ApiResponse::ok(pair, "Token refreshed"))
}

/// Revoke a refresh token. Always answers 204.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let Some(token) = bearer_token(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    // idempotent
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    AppState,
    utils::{Claims, error_codes, error_to_api_response, generate_token, success_to_api_response},
};

use super::model::{AuthResponse, LoginRequest, RegisterRequest, UpdatePasswordRequest, User};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    // 简单的邮箱格式检查
    if !req.email.contains('@') || req.email.trim().len() < 3 {
        return (
            StatusCode::OK,
            error_to_api_response(error_codes::VALIDATION_ERROR, "邮箱格式无效".to_string()),
        );
    }
    if req.password.len() < 8 {
        return (
            StatusCode::OK,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "密码长度至少8个字符".to_string(),
            ),
        );
    }

    match User::create(&state.pool, req).await {
        Ok(user) => match generate_token(&user.id.to_string(), &state.config) {
            Ok((token, _)) => (
                StatusCode::OK,
                success_to_api_response(AuthResponse {
                    user_id: user.id,
                    email: user.email,
                    full_name: user.full_name,
                    token,
                }),
            ),
            Err(_) => (
                StatusCode::OK,
                error_to_api_response(error_codes::INTERNAL_ERROR, "生成令牌失败".to_string()),
            ),
        },
        Err(e) => {
            if e.to_string().contains("unique constraint") {
                (
                    StatusCode::OK,
                    error_to_api_response(error_codes::USER_EXISTS, "邮箱已被注册".to_string()),
                )
            } else {
                (
                    StatusCode::OK,
                    error_to_api_response(error_codes::INTERNAL_ERROR, "创建用户失败".to_string()),
                )
            }
        }
    }
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let user = match User::find_by_email(&state.pool, &req.email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::OK,
                error_to_api_response(error_codes::NOT_FOUND, "用户不存在".to_string()),
            );
        }
        Err(_) => {
            return (
                StatusCode::OK,
                error_to_api_response(error_codes::INTERNAL_ERROR, "数据库错误".to_string()),
            );
        }
    };

    match user.verify_login(&req.password) {
        Ok(true) => {}
        Ok(false) => {
            return (
                StatusCode::OK,
                error_to_api_response(error_codes::AUTH_FAILED, "密码无效".to_string()),
            );
        }
        Err(_) => {
            return (
                StatusCode::OK,
                error_to_api_response(error_codes::INTERNAL_ERROR, "密码校验失败".to_string()),
            );
        }
    }

    match generate_token(&user.id.to_string(), &state.config) {
        Ok((token, _)) => (
            StatusCode::OK,
            success_to_api_response(AuthResponse {
                user_id: user.id,
                email: user.email,
                full_name: user.full_name,
                token,
            }),
        ),
        Err(_) => (
            StatusCode::OK,
            error_to_api_response(error_codes::INTERNAL_ERROR, "生成令牌失败".to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    let user_id = match claims.sub.parse::<Uuid>() {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::OK,
                error_to_api_response(error_codes::AUTH_FAILED, "令牌无效".to_string()),
            );
        }
    };

    match User::find_by_id(&state.pool, user_id).await {
        Ok(Some(user)) => (StatusCode::OK, success_to_api_response(user.profile())),
        Ok(None) => (
            StatusCode::OK,
            error_to_api_response(error_codes::NOT_FOUND, "用户不存在".to_string()),
        ),
        Err(_) => (
            StatusCode::OK,
            error_to_api_response(error_codes::INTERNAL_ERROR, "数据库错误".to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn update_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdatePasswordRequest>,
) -> impl IntoResponse {
    if req.password.len() < 8 {
        return (
            StatusCode::OK,
            error_to_api_response::<()>(
                error_codes::VALIDATION_ERROR,
                "密码长度至少8个字符".to_string(),
            ),
        );
    }

    let user_id = match claims.sub.parse::<Uuid>() {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::OK,
                error_to_api_response(error_codes::AUTH_FAILED, "令牌无效".to_string()),
            );
        }
    };

    match User::update_password(&state.pool, user_id, &req.password).await {
        Ok(()) => (StatusCode::OK, success_to_api_response(())),
        Err(_) => (
            StatusCode::OK,
            error_to_api_response(error_codes::INTERNAL_ERROR, "更新密码失败".to_string()),
        ),
    }
}

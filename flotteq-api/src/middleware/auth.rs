/// JWT authentication layer
///
/// Reads `Authorization: Bearer <token>`, validates it as an access token and
/// resolves the caller against the database (user active, tenant active,
/// permissions). The resulting [`AuthContext`] is inserted into the request
/// extensions for handlers to pick up with `Extension<AuthContext>`.

use crate::{app::AppState, error::ApiError};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use flotteq_shared::auth::{
    jwt,
    middleware::{bearer_token, AuthContext},
};

pub async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?;
    let claims = jwt::validate_access_token(token, state.jwt_secret())?;

    let auth_context = AuthContext::resolve(&state.db, &claims).await?;

    tracing::Span::current().record("user_id", tracing::field::display(auth_context.user_id));
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

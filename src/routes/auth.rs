use askama::Template;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::{cookie::Cookie, CookieJar};
use serde::Deserialize;

use super::{render, session_cookie, Nav};
use crate::{
    auth_middleware::SESSION_COOKIE,
    backend::BackendError,
    error::AppError,
    models::LoginForm,
    AppState,
};

#[derive(Debug, Deserialize, Default)]
pub struct LoginQuery {
    // Set after a registration that still needs e-mail confirmation
    pub registered: Option<String>,
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    nav: Nav,
    email: String,
    error: String,
    notice: String,
}

pub async fn login_page(Query(query): Query<LoginQuery>) -> Result<impl IntoResponse, AppError> {
    let notice = if query.registered.is_some() {
        "Registration complete. Please confirm your e-mail address, then sign in.".to_string()
    } else {
        String::new()
    };
    render(&LoginTemplate { nav: Nav::default(), email: String::new(), error: String::new(), notice })
}

// Handler for POST /login
pub async fn handle_login(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    tracing::info!("[HANDLER] POST /login - sign-in attempt for {}", form.email);

    let session = match app_state.backend.sign_in(form.email.trim(), &form.password).await {
        Ok(session) => session,
        Err(BackendError::Api { message, .. }) => {
            tracing::warn!("Sign-in rejected for {}: {}", form.email, message);
            let template = LoginTemplate {
                nav: Nav::default(),
                email: form.email,
                error: message,
                notice: String::new(),
            };
            return Ok(render(&template)?.into_response());
        }
        Err(e) => return Err(e.into()),
    };

    // Warm the cache so the redirected page doesn't repeat the lookup
    app_state
        .sessions
        .refresh(&session.access_token, app_state.backend.as_ref())
        .await?;
    tracing::info!("User {} signed in", session.user.id);

    let jar = jar.add(session_cookie(session.access_token));
    Ok((jar, Redirect::to("/")).into_response())
}

// Handler for POST /logout
pub async fn handle_logout(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) {
        // The cookie goes regardless; a failed revoke only leaves the token to expire
        if let Err(e) = app_state.backend.sign_out(&token).await {
            tracing::warn!("Sign-out request failed: {}", e);
        }
        app_state.sessions.invalidate(&token).await;
        tracing::info!("[HANDLER] POST /logout - session closed");
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Redirect::to("/")))
}

#[cfg(test)]
mod tests {
    use crate::auth_middleware::SESSION_COOKIE;
    use crate::models::{Profile, UserType};
    use crate::routes::tests::{app, body_text, cookies_from, fleet, get, location, post_form};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn login_sets_session_cookie_and_logout_clears_it() {
        let backend = fleet();
        backend.add_account("u1", "orla@example.ie", "hunter22");
        backend
            .profiles
            .lock()
            .unwrap()
            .insert("u1".into(), Profile::basic("u1", UserType::Private, "Orla Byrne"));
        let app = app(backend.clone());

        let response = app
            .clone()
            .oneshot(post_form("/login", "email=orla%40example.ie&password=hunter22", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        let cookie = cookies_from(&response);
        assert_eq!(cookie, format!("{}=token-u1", SESSION_COOKIE));

        let home = Request::builder()
            .uri("/")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let html = body_text(app.clone().oneshot(home).await.unwrap()).await;
        assert!(html.contains("Orla Byrne"));

        let response = app
            .clone()
            .oneshot(post_form("/logout", "", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let removal = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(removal.starts_with(&format!("{}=;", SESSION_COOKIE)));

        // The revoked token no longer resolves to a user
        let me = Request::builder()
            .uri("/api/me")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(me).await.unwrap().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bad_credentials_rerender_with_backend_message() {
        let backend = fleet();
        backend.add_account("u1", "orla@example.ie", "hunter22");
        let response = app(backend)
            .oneshot(post_form("/login", "email=orla%40example.ie&password=wrong", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Invalid login credentials"));
    }

    #[tokio::test]
    async fn login_page_shows_confirmation_notice() {
        let html = body_text(app(fleet()).oneshot(get("/login?registered=1")).await.unwrap()).await;
        assert!(html.contains("confirm your e-mail"));
    }
}

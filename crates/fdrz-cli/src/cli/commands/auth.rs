//! Session command handlers.

use anyhow::{Context, Result, bail};
use fdrz_core::api::UsersApi;
use fdrz_core::identity::IdentityProvider;
use fdrz_core::session::Access;
use fdrz_core::token;
use tracing::debug;

use super::{App, auth_error};

pub async fn login(app: &App) -> Result<()> {
    app.auth.login().await.map_err(auth_error)?;
    print_signed_in(app);
    Ok(())
}

pub async fn login_silent(app: &App) -> Result<()> {
    app.auth.login_silent().await.map_err(auth_error)?;
    print_signed_in(app);
    Ok(())
}

pub async fn login_password(app: &App, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt_password()?,
    };
    if password.is_empty() {
        bail!("Password cannot be empty");
    }

    app.auth
        .login_with_password(username, &password)
        .await
        .map_err(auth_error)?;
    print_signed_in(app);
    Ok(())
}

pub async fn logout(app: &App) -> Result<()> {
    app.store.restore();
    if app.store.token().is_none() && app.auth.provider().cached_account().is_none() {
        println!("Not logged in (no session found).");
        return Ok(());
    }

    app.auth.logout().await.map_err(auth_error)?;
    println!("✓ Logged out");
    println!("  Session removed from: {}", app.session_path().display());
    Ok(())
}

pub async fn status(app: &App) -> Result<()> {
    app.auth.restore().await;

    // Hydrate the profile so the role check has something to look at.
    if app.store.token().is_some() && app.store.snapshot().user.is_none() {
        match UsersApi::new(app.gateway.clone()).current_user().await {
            Ok(user) => app.store.set_user(user),
            Err(err) => debug!(error = %err, "could not load profile"),
        }
    }

    let state = app.store.snapshot();
    println!("Backend: {}", app.config.api.base_url);
    println!("Status:  {}", state.status);

    if let Some(user) = &state.user {
        println!("User:    {} <{}> ({})", user.name, user.email, user.role);
        if let Some(department) = &user.department {
            println!("Dept:    {department}");
        }
    }
    if let Some(account) = &state.account {
        println!("Account: {}", account.username);
    }
    match state.token.as_deref() {
        Some(raw) => {
            println!("Token:   {}", token::mask_token(raw));
            let expiry = token::get_token_expiration(Some(raw))
                .map_or_else(|| "unknown".to_string(), |at| at.to_rfc3339());
            let stale = token::is_token_expired(Some(raw), app.config.session.expiry_buffer_secs);
            println!("Expires: {expiry}{}", if stale { " (expired)" } else { "" });
        }
        None => println!("Token:   none"),
    }
    if let Some(error) = &state.error {
        println!("Error:   {error}");
    }

    let access = match Access::evaluate(&state, None) {
        Access::Loading => "pending",
        Access::RequiresLogin => "login required",
        Access::Forbidden => "forbidden",
        Access::Granted => "granted",
    };
    println!("Access:  {access}");
    Ok(())
}

pub async fn token(app: &App) -> Result<()> {
    let raw = app.require_token().await?;
    println!("{raw}");
    Ok(())
}

pub async fn refresh(app: &App) -> Result<()> {
    app.require_token().await?;
    app.auth.refresh_session().await.map_err(auth_error)?;
    let fresh = app.store.token().unwrap_or_default();
    println!("✓ Session refreshed (token: {})", token::mask_token(&fresh));
    Ok(())
}

fn print_signed_in(app: &App) {
    let state = app.store.snapshot();
    println!();
    if state.token.is_none() {
        println!("No session established (the identity provider returned no access token).");
        return;
    }
    match &state.user {
        Some(user) => println!("✓ Logged in as {} <{}>", user.name, user.email),
        None => println!("✓ Logged in"),
    }
    println!("  Session saved to: {}", app.session_path().display());
}

fn prompt_password() -> Result<String> {
    rpassword::prompt_password("Password: ").context("read password")
}

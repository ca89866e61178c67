//! User profile command handlers.

use anyhow::{Result, bail};
use fdrz_core::api::{UpdateUser, UsersApi};
use fdrz_core::session::User;

use super::{App, api_error};

async fn api(app: &App) -> Result<UsersApi> {
    app.require_token().await?;
    Ok(UsersApi::new(app.gateway.clone()))
}

pub async fn me(app: &App) -> Result<()> {
    let user = api(app).await?.current_user().await.map_err(api_error)?;
    print_user(&user);
    Ok(())
}

pub async fn list(app: &App) -> Result<()> {
    let users = api(app).await?.list().await.map_err(api_error)?;
    if users.is_empty() {
        println!("No users found.");
    }
    for user in users {
        println!("{}  {}  <{}>  {}", user.id, user.name, user.email, user.role);
    }
    Ok(())
}

pub async fn update(app: &App, name: Option<String>, department: Option<String>) -> Result<()> {
    if name.is_none() && department.is_none() {
        bail!("Nothing to update (pass --name or --department)");
    }
    let update = UpdateUser { name, department };
    let user = api(app)
        .await?
        .update_current_user(&update)
        .await
        .map_err(api_error)?;
    // Keep the in-memory profile current for anything else in this process.
    app.store.set_user(user.clone());
    println!("✓ Profile updated");
    print_user(&user);
    Ok(())
}

fn print_user(user: &User) {
    println!("{} <{}>", user.name, user.email);
    println!("  Id:   {}", user.id);
    println!("  Role: {}", user.role);
    if let Some(department) = &user.department {
        println!("  Dept: {department}");
    }
}

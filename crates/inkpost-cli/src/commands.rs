use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::warn;

use inkpost_core::auth::IdentitySource;
use inkpost_core::models::{ImageUpload, NewPost, Post, SignUp};
use inkpost_core::navigation::{Navigator, LOGIN_PATH};
use inkpost_core::utils::{format_date, format_optional, truncate_string};
use inkpost_core::{ApiError, ViewScope, Visit};

use crate::App;

/// Environment variable read before prompting for a password
const PASSWORD_ENV: &str = "INKPOST_PASSWORD";

/// Width of the snippet column in `posts`
const SNIPPET_WIDTH: usize = 72;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: Option<String> },
    Logout,
    WhoAmI,
    Profile,
    Posts { json: bool },
    Post { id: String, json: bool },
    NewPost {
        title: String,
        snippet: String,
        content_file: PathBuf,
        image: Option<PathBuf>,
    },
    SignUp,
    Validate { challenge: String },
    Open { path: String },
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let json = args.iter().any(|a| a == "--json");
        let args: Vec<&str> = args
            .iter()
            .map(String::as_str)
            .filter(|a| *a != "--json")
            .collect();

        let command = match args.as_slice() {
            ["login"] => Command::Login { username: None },
            ["login", username] => Command::Login {
                username: Some(username.to_string()),
            },
            ["logout"] => Command::Logout,
            ["whoami"] => Command::WhoAmI,
            ["profile"] => Command::Profile,
            ["posts"] => Command::Posts { json },
            ["post", id] => Command::Post {
                id: id.to_string(),
                json,
            },
            ["new-post", title, snippet, content_file] => Command::NewPost {
                title: title.to_string(),
                snippet: snippet.to_string(),
                content_file: PathBuf::from(content_file),
                image: None,
            },
            ["new-post", title, snippet, content_file, image] => Command::NewPost {
                title: title.to_string(),
                snippet: snippet.to_string(),
                content_file: PathBuf::from(content_file),
                image: Some(PathBuf::from(image)),
            },
            ["signup"] => Command::SignUp,
            ["validate", challenge] => Command::Validate {
                challenge: challenge.to_string(),
            },
            ["open", path] => Command::Open {
                path: path.to_string(),
            },
            [] => return Err("No command given".to_string()),
            [other, ..] => return Err(format!("Unknown command or wrong arguments: {}", other)),
        };
        Ok(command)
    }
}

pub async fn run(app: &mut App, command: Command) -> Result<ExitCode> {
    match command {
        Command::Login { username } => login(app, username).await,
        Command::Logout => {
            app.auth.logout();
            println!("Signed out.");
            Ok(ExitCode::SUCCESS)
        }
        Command::WhoAmI => {
            whoami(app);
            Ok(ExitCode::SUCCESS)
        }
        Command::Profile => profile(app).await,
        Command::Posts { json } => posts(app, json).await,
        Command::Post { id, json } => post(app, &id, json).await,
        Command::NewPost {
            title,
            snippet,
            content_file,
            image,
        } => new_post(app, title, snippet, content_file, image).await,
        Command::SignUp => sign_up(app).await,
        Command::Validate { challenge } => validate(app, &challenge).await,
        Command::Open { path } => open(app, &path).await,
    }
}

// ============================================================================
// Session
// ============================================================================

async fn login(app: &mut App, username: Option<String>) -> Result<ExitCode> {
    let _scope = render(app, LOGIN_PATH);
    let context = app.auth.take_login_context();
    if let Some(notice) = context.notice {
        println!("{}", notice.message());
    }
    let signed_in = sign_in(app, username, context.intended_path()).await?;
    Ok(if signed_in {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Prompt for whatever is missing and sign in, resuming at `intended_path`.
/// Failures are reported here; the return value says whether it worked.
async fn sign_in(
    app: &mut App,
    username: Option<String>,
    intended_path: Option<&str>,
) -> Result<bool> {
    let username = match username {
        Some(username) => username,
        None => prompt_line("Username", app.config.last_username.as_deref())?,
    };
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    match app.auth.login(&username, &password, intended_path).await {
        Ok(identity) => {
            app.config.last_username = Some(username);
            if let Err(e) = app.config.save() {
                warn!(error = %e, "Failed to save config");
            }
            println!("Signed in as {}.", identity.display_name());
            Ok(true)
        }
        // The login form shows its own message for a rejected pair
        Err(e @ ApiError::Authentication(_)) => {
            eprintln!("{}", e);
            Ok(false)
        }
        Err(e) => {
            report(app, e);
            Ok(false)
        }
    }
}

fn whoami(app: &App) {
    let session = app.auth.session();
    let Some(identity) = session.identity() else {
        println!("Not signed in.");
        return;
    };

    match identity.source {
        IdentitySource::Restored => {
            println!("Signed in (run `inkpost profile` to load account details).")
        }
        _ => println!("Signed in as {}.", identity.display_name()),
    }
    if let Some(ref email) = identity.email {
        println!("Email: {}", email);
    }
    if let Some(at) = session.established_at() {
        println!(
            "Session started {}",
            at.with_timezone(&chrono::Local).format("%b %d, %Y %H:%M")
        );
    }
}

// ============================================================================
// Views
// ============================================================================

async fn profile(app: &mut App) -> Result<ExitCode> {
    let Some(scope) = enter(app, "/profile").await? else {
        return Ok(ExitCode::FAILURE);
    };

    match app.gateway.fetch_profile(&scope).await {
        Ok(profile) => {
            println!("Username: {}", profile.username);
            println!("Name:     {}", format_optional(profile.full_name().as_deref(), "-"));
            println!("Email:    {}", format_optional(profile.email.as_deref(), "-"));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report(app, e)),
    }
}

async fn posts(app: &mut App, json: bool) -> Result<ExitCode> {
    let Some(scope) = enter(app, "/").await? else {
        return Ok(ExitCode::FAILURE);
    };

    let posts = match app.gateway.list_posts(&scope).await {
        Ok(posts) => posts,
        Err(e) => return Ok(report(app, e)),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&posts)?);
        return Ok(ExitCode::SUCCESS);
    }
    if posts.is_empty() {
        println!("No posts yet.");
    }
    for post in &posts {
        println!(
            "{:>6}  {:<12}  {}  ({})",
            post.id,
            format_date(post.date.as_deref().unwrap_or("")),
            post.title,
            post.author_display()
        );
        if let Some(ref snippet) = post.snippet {
            println!("        {}", truncate_string(snippet, SNIPPET_WIDTH));
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn post(app: &mut App, id: &str, json: bool) -> Result<ExitCode> {
    let Some(scope) = enter(app, &format!("/posts/{}", id)).await? else {
        return Ok(ExitCode::FAILURE);
    };

    let post = match app.gateway.get_post(id, &scope).await {
        Ok(post) => post,
        Err(e) => return Ok(report(app, e)),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&post)?);
    } else {
        print_post(&post);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_post(post: &Post) {
    println!("{}", post.title);
    println!(
        "by {} on {}",
        post.author_display(),
        format_date(post.date.as_deref().unwrap_or("-"))
    );
    if let Some(ref image_url) = post.image_url {
        println!("Image: {}", image_url);
    }
    println!();
    if let Some(ref content) = post.content {
        println!("{}", content);
    }
}

async fn new_post(
    app: &mut App,
    title: String,
    snippet: String,
    content_file: PathBuf,
    image: Option<PathBuf>,
) -> Result<ExitCode> {
    let Some(scope) = enter(app, "/posts/new").await? else {
        return Ok(ExitCode::FAILURE);
    };

    let content = std::fs::read_to_string(&content_file)
        .with_context(|| format!("Failed to read {}", content_file.display()))?;
    let image = match image {
        Some(path) => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            Some(ImageUpload::from_bytes(file_name, bytes))
        }
        None => None,
    };

    let draft = NewPost {
        title,
        snippet,
        content,
        date: chrono::Local::now().date_naive(),
        image,
    };

    match app.gateway.create_post(draft, &scope).await {
        Ok(post) => {
            println!("Published \"{}\" (id {}).", post.title, post.id);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report(app, e)),
    }
}

async fn sign_up(app: &mut App) -> Result<ExitCode> {
    let Some(scope) = enter(app, "/signup").await? else {
        return Ok(ExitCode::FAILURE);
    };

    let form = SignUp {
        given_name: prompt_line("First name", None)?,
        family_name: prompt_line("Last name", None)?,
        username: prompt_line("Username", None)?,
        email: prompt_line("Email", None)?,
        password: rpassword::prompt_password("Password: ").context("Failed to read password")?,
        confirm_password: rpassword::prompt_password("Confirm password: ")
            .context("Failed to read password")?,
    };

    match app.gateway.sign_up(&form, &scope).await {
        Ok(()) => {
            print_login_notice(app);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report(app, e)),
    }
}

async fn validate(app: &mut App, challenge: &str) -> Result<ExitCode> {
    let target = format!("/validate?challenge={}", challenge);
    let Some(scope) = enter(app, &target).await? else {
        return Ok(ExitCode::FAILURE);
    };

    match app.gateway.validate_account(challenge, &scope).await {
        Ok(()) => {
            print_login_notice(app);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report(app, e)),
    }
}

async fn open(app: &mut App, path: &str) -> Result<ExitCode> {
    match enter(app, path).await? {
        Some(scope) => {
            println!("Opened {}", app.history.current().href());
            drop(scope);
            Ok(ExitCode::SUCCESS)
        }
        None => Ok(ExitCode::FAILURE),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Visit `path` and return the scope of the view that renders there.
fn render(app: &App, path: &str) -> Option<ViewScope> {
    match app.router.visit(path) {
        Visit::Render { scope, .. } => Some(scope),
        Visit::Redirected { .. } => None,
    }
}

/// Visit `path`, detouring through sign-in when the guard sends us to the
/// login view. Returns `None` when sign-in did not succeed.
async fn enter(app: &mut App, path: &str) -> Result<Option<ViewScope>> {
    match app.router.visit(path) {
        Visit::Render { scope, .. } => Ok(Some(scope)),
        Visit::Redirected { to } => {
            println!("{} requires sign in.", path);
            let context = app.auth.take_login_context();
            let intended = context
                .intended_path()
                .map(str::to_string)
                .unwrap_or_else(|| to.href());
            if !sign_in(app, None, Some(&intended)).await? {
                return Ok(None);
            }
            // Login resumed at the intended path; the guard runs again there
            Ok(render(app, &intended))
        }
    }
}

/// Show the message for an API failure.
///
/// Rejected credentials already redirected to the login view, so the notice
/// that view would show is printed instead of the error itself.
fn report(app: &App, err: ApiError) -> ExitCode {
    if err.is_intercepted() {
        let context = app.auth.take_login_context();
        match context.notice {
            Some(notice) => eprintln!("{}", notice.message()),
            None => eprintln!("Please sign in: inkpost login"),
        }
    } else if let Some(message) = err.user_message() {
        eprintln!("Error: {}", message);
    }
    ExitCode::FAILURE
}

fn print_login_notice(app: &App) {
    if app.auth.navigator().current().path != LOGIN_PATH {
        return;
    }
    if let Some(notice) = app.auth.take_login_context().notice {
        println!("{}", notice.message());
    }
}

fn prompt_line(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(default) => print!("{} [{}]: ", label, default),
        None => print!("{}: ", label),
    }
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read input")?;
    let line = line.trim();
    Ok(match (line.is_empty(), default) {
        (true, Some(default)) => default.to_string(),
        _ => line.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_login() {
        assert_eq!(
            Command::parse(&args(&["login"])).unwrap(),
            Command::Login { username: None }
        );
        assert_eq!(
            Command::parse(&args(&["login", "alice"])).unwrap(),
            Command::Login {
                username: Some("alice".into())
            }
        );
    }

    #[test]
    fn test_parse_json_flag_anywhere() {
        assert_eq!(
            Command::parse(&args(&["--json", "post", "7"])).unwrap(),
            Command::Post {
                id: "7".into(),
                json: true
            }
        );
        assert_eq!(
            Command::parse(&args(&["posts"])).unwrap(),
            Command::Posts { json: false }
        );
    }

    #[test]
    fn test_parse_new_post_with_image() {
        let command =
            Command::parse(&args(&["new-post", "Hi", "Short", "body.md", "cover.png"])).unwrap();
        assert_eq!(
            command,
            Command::NewPost {
                title: "Hi".into(),
                snippet: "Short".into(),
                content_file: PathBuf::from("body.md"),
                image: Some(PathBuf::from("cover.png")),
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse(&[]).is_err());
        assert!(Command::parse(&args(&["post"])).is_err());
        assert!(Command::parse(&args(&["frobnicate"])).is_err());
    }
}

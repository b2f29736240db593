//! JSON API handlers for users and blogs

use once_cell::sync::Lazy;
use quill_orm::{Executor, FindAll, OrmError, Page, Repo, DEFAULT_PAGE_SIZE};
use regex::Regex;
use serde_json::{json, Value};

use crate::binder::Kwargs;
use crate::error::{ApiError, DomainError};
use crate::handler::RequestHandler;
use crate::models::{Blog, User};
use crate::route::{get, post, Route};
use crate::signature::HandlerSignature;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9.\-_]+@[a-z0-9\-_]+(\.[a-z0-9\-_]+){1,4}$").expect("valid email regex")
});

type HandlerResult = Result<Value, ApiError>;

/// `page` keyword, defaulting to the first page
fn page_index(kw: &Kwargs) -> Result<u64, DomainError> {
    Ok(kw.parse::<u64>("page")?.unwrap_or(1))
}

/// Required, non-blank string keyword
fn non_blank(kw: &Kwargs, name: &str) -> Result<String, DomainError> {
    let value: String = kw.require(name)?;
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::value_invalid(name, format!("{} cannot be empty", name)));
    }
    Ok(value.to_owned())
}

async fn list_users(db: Executor, kw: Kwargs) -> HandlerResult {
    let repo = Repo::<User>::new(&db);
    let total = repo.count(None, vec![]).await?;
    let page = Page::new(total, page_index(&kw)?, DEFAULT_PAGE_SIZE);
    if page.is_empty() {
        return Ok(json!({ "page": page, "users": [] }));
    }

    let users = repo
        .find_all(
            FindAll::new()
                .order_by("`created_at` desc")
                .limit(page.limit_clause()),
        )
        .await?;
    let users: Vec<Value> = users.iter().map(User::to_public).collect();
    Ok(json!({ "page": page, "users": users }))
}

async fn register_user(db: Executor, kw: Kwargs) -> HandlerResult {
    let email = non_blank(&kw, "email")?.to_lowercase();
    if !EMAIL_PATTERN.is_match(&email) {
        return Err(DomainError::value_invalid("email", "invalid email address").into());
    }
    let name = non_blank(&kw, "name")?;
    let passwd = non_blank(&kw, "passwd")?;

    let repo = Repo::<User>::new(&db);
    if repo.find(email.as_str()).await?.is_some() {
        return Err(email_in_use().into());
    }

    let mut user = User::new(email, name, passwd);
    repo.save(&mut user).await.map_err(registration_error)?;
    tracing::info!("registered user {}", user.email);
    Ok(user.to_public())
}

fn email_in_use() -> DomainError {
    DomainError::new("register:failed", "email", "Email is already in use.")
}

/// A concurrent registration can insert the same email between our lookup
/// and our insert; the key constraint then reports it.
fn registration_error(e: OrmError) -> ApiError {
    if e.is_unique_violation() {
        email_in_use().into()
    } else {
        e.into()
    }
}

async fn get_user(db: Executor, kw: Kwargs) -> HandlerResult {
    let email: String = kw.require("email")?;
    match Repo::<User>::new(&db).find(email.as_str()).await? {
        Some(user) => Ok(user.to_public()),
        None => Err(DomainError::not_found("email", format!("no user {}", email)).into()),
    }
}

async fn delete_user(db: Executor, kw: Kwargs) -> HandlerResult {
    let email: String = kw.require("email")?;
    if let Some(request) = kw.request() {
        tracing::info!("{} {} deleting user {}", request.method, request.path, email);
    }

    let repo = Repo::<User>::new(&db);
    let Some(user) = repo.find(email.as_str()).await? else {
        return Err(DomainError::not_found("email", format!("no user {}", email)).into());
    };
    repo.remove(&user).await?;
    Ok(json!({ "email": email }))
}

async fn list_blogs(db: Executor, kw: Kwargs) -> HandlerResult {
    let repo = Repo::<Blog>::new(&db);
    let total = repo.count(None, vec![]).await?;
    let page = Page::new(total, page_index(&kw)?, DEFAULT_PAGE_SIZE);
    if page.is_empty() {
        return Ok(json!({ "page": page, "blogs": [] }));
    }

    let blogs = repo
        .find_all(
            FindAll::new()
                .order_by("`created_at` desc")
                .limit(page.limit_clause()),
        )
        .await?;
    Ok(json!({ "page": page, "blogs": blogs }))
}

async fn create_blog(db: Executor, kw: Kwargs) -> HandlerResult {
    let user_email: String = kw.require("user_email")?;
    let name = non_blank(&kw, "name")?;
    let summary = non_blank(&kw, "summary")?;
    let content = non_blank(&kw, "content")?;

    let Some(author) = Repo::<User>::new(&db).find(user_email.as_str()).await? else {
        return Err(DomainError::permission("only registered users can post").into());
    };

    let mut blog = Blog {
        id: None,
        user_email: author.email,
        user_name: author.name,
        name,
        summary,
        content,
        created_at: None,
    };
    Repo::<Blog>::new(&db).save(&mut blog).await?;
    Ok(json!(blog))
}

async fn get_blog(db: Executor, kw: Kwargs) -> HandlerResult {
    let id: String = kw.require("id")?;
    match Repo::<Blog>::new(&db).find(id.as_str()).await? {
        Some(blog) => Ok(json!(blog)),
        None => Err(DomainError::not_found("id", format!("no blog {}", id)).into()),
    }
}

/// Wrap `f` so each call gets its own handle on `db`.
fn handler<F, Fut>(name: &str, signature: HandlerSignature, db: &Executor, f: F) -> RequestHandler
where
    F: Fn(Executor, Kwargs) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = HandlerResult> + Send + 'static,
{
    let db = db.clone();
    RequestHandler::new(name, signature, move |kw| f(db.clone(), kw))
}

/// Every API route, bound to `db`.
pub fn build_routes(db: &Executor) -> Result<Vec<Route>, crate::signature::RegistrationError> {
    let page_only = || HandlerSignature::builder().optional("page").build();

    Ok(vec![
        get("/api/users", handler("api_users", page_only()?, db, list_users)),
        post(
            "/api/users",
            handler(
                "api_register_user",
                HandlerSignature::builder()
                    .required("email")
                    .required("name")
                    .required("passwd")
                    .build()?,
                db,
                register_user,
            ),
        ),
        get(
            "/api/users/{email}",
            handler(
                "api_get_user",
                HandlerSignature::builder().positional("email").build()?,
                db,
                get_user,
            ),
        ),
        post(
            "/api/users/{email}/delete",
            handler(
                "api_delete_user",
                HandlerSignature::builder()
                    .positional("email")
                    .request("request")
                    .build()?,
                db,
                delete_user,
            ),
        ),
        get("/api/blogs", handler("api_blogs", page_only()?, db, list_blogs)),
        post(
            "/api/blogs",
            handler(
                "api_create_blog",
                HandlerSignature::builder()
                    .required("user_email")
                    .required("name")
                    .required("summary")
                    .required("content")
                    .build()?,
                db,
                create_blog,
            ),
        ),
        get(
            "/api/blogs/{id}",
            handler(
                "api_get_blog",
                HandlerSignature::builder().positional("id").build()?,
                db,
                get_blog,
            ),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_pattern() {
        assert!(EMAIL_PATTERN.is_match("a@example.com"));
        assert!(EMAIL_PATTERN.is_match("first.last-1@mail.example.co.uk"));
        assert!(!EMAIL_PATTERN.is_match("no-at-sign"));
        assert!(!EMAIL_PATTERN.is_match("a@nodot"));
    }

    #[test]
    fn non_blank_trims() {
        let kw = Kwargs::from(json!({"name": "  Alice "}).as_object().unwrap().clone());
        assert_eq!(non_blank(&kw, "name").unwrap(), "Alice");

        let kw = Kwargs::from(json!({"name": "   "}).as_object().unwrap().clone());
        assert_eq!(non_blank(&kw, "name").unwrap_err().error, "value:invalid");
    }

    #[tokio::test]
    async fn key_collision_on_insert_is_register_failed() {
        use quill_orm::{DatabaseConfig, Pool};

        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("race.db").display());
        let db = Executor::new(Pool::create(&DatabaseConfig::from_url(url)).await.unwrap());
        db.execute("create table `seen` (`email` varchar(50) primary key)", &[])
            .await
            .unwrap();

        let insert = "insert into `seen` (`email`) values (?)";
        db.execute(insert, &[json!("a@example.com")]).await.unwrap();
        let collision = db.execute(insert, &[json!("a@example.com")]).await.unwrap_err();
        assert!(collision.is_unique_violation());

        match registration_error(collision) {
            ApiError::Domain(d) => {
                assert_eq!(d.error, "register:failed");
                assert_eq!(d.data, "email");
            }
            other => panic!("expected domain error, got {:?}", other),
        }

        let other = registration_error(OrmError::config("boom"));
        assert!(matches!(other, ApiError::Database(_)));
    }
}

//! Repository round trips against a temporary SQLite database

use quill_orm::{
    register, DatabaseConfig, Entity, Executor, FieldDecl, FindAll, Limit, MutationPolicy,
    OrmError, Page, Pool, Repo,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    email: String,
    name: String,
    passwd: String,
    image: String,
    admin: Option<bool>,
    created_at: Option<f64>,
}

impl Entity for User {
    const NAME: &'static str = "User";
    const TABLE: Option<&'static str> = Some("users");

    fn fields() -> Vec<FieldDecl> {
        vec![
            FieldDecl::string("email").ddl("varchar(50)").primary_key(),
            FieldDecl::string("name").ddl("varchar(50)"),
            FieldDecl::string("passwd").ddl("varchar(50)"),
            FieldDecl::string("image").ddl("varchar(500)"),
            FieldDecl::boolean("admin"),
            FieldDecl::float("created_at").default_with(|| json!(1_700_000_000.5)),
        ]
    }
}

/// Entity with nothing but a key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Tag {
    id: i64,
}

impl Entity for Tag {
    const NAME: &'static str = "Tag";
    const TABLE: Option<&'static str> = Some("tags");

    fn fields() -> Vec<FieldDecl> {
        vec![FieldDecl::integer("id").primary_key()]
    }
}

fn user(email: &str, name: &str) -> User {
    User {
        email: email.into(),
        name: name.into(),
        passwd: "1234567890".into(),
        image: "about:blank".into(),
        admin: None,
        created_at: None,
    }
}

async fn setup(policy: MutationPolicy) -> (TempDir, Executor) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    let config = DatabaseConfig {
        max_pool_size: 4,
        mutation_policy: policy,
        ..DatabaseConfig::from_url(url)
    };

    let db = Executor::new(Pool::create(&config).await.unwrap());
    db.execute(
        "create table `users` (
            `email` varchar(50) primary key,
            `name` varchar(50) not null,
            `passwd` varchar(50) not null,
            `image` varchar(500) not null,
            `admin` tinyint(1) not null,
            `created_at` real not null
        )",
        &[],
    )
    .await
    .unwrap();

    db.execute("create table `tags` (`id` bigint primary key)", &[])
        .await
        .unwrap();

    register::<User>().unwrap();
    register::<Tag>().unwrap();
    (dir, db)
}

#[tokio::test]
async fn save_then_find_round_trips_with_defaults() {
    let (_dir, db) = setup(MutationPolicy::Strict).await;
    let repo = Repo::<User>::new(&db);

    let mut alice = user("a@example.com", "Alice");
    assert_eq!(repo.save(&mut alice).await.unwrap(), 1);

    // Defaults were materialized on the instance
    assert_eq!(alice.admin, Some(false));
    assert_eq!(alice.created_at, Some(1_700_000_000.5));

    let found = repo.find("a@example.com").await.unwrap().expect("row saved");
    assert_eq!(found.name, "Alice");
    assert_eq!(found, alice);
}

#[tokio::test]
async fn find_missing_is_none() {
    let (_dir, db) = setup(MutationPolicy::Strict).await;
    let found = Repo::<User>::new(&db).find("nobody@example.com").await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn find_all_applies_order_and_range() {
    let (_dir, db) = setup(MutationPolicy::Strict).await;
    let repo = Repo::<User>::new(&db);

    for (i, name) in ["e", "b", "d", "a", "c"].iter().enumerate() {
        let mut u = user(&format!("{}@example.com", i), name);
        repo.save(&mut u).await.unwrap();
    }

    let page = repo
        .find_all(FindAll::new().order_by("`name`").limit(Limit::Range(1, 3)))
        .await
        .unwrap();
    let names: Vec<&str> = page.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["b", "c", "d"]);

    let filtered = repo
        .find_all(FindAll::new().filter("`name`>?", vec![json!("c")]).order_by("`name` desc"))
        .await
        .unwrap();
    let names: Vec<&str> = filtered.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["e", "d"]);

    let capped = repo
        .find_all(FindAll::new().limit(Limit::Count(2)))
        .await
        .unwrap();
    assert_eq!(capped.len(), 2);
}

#[tokio::test]
async fn find_number_and_paging() {
    let (_dir, db) = setup(MutationPolicy::Strict).await;
    let repo = Repo::<User>::new(&db);

    assert_eq!(repo.count(None, vec![]).await.unwrap(), 0);

    for i in 0..12 {
        let mut u = user(&format!("{:02}@example.com", i), &format!("user{:02}", i));
        repo.save(&mut u).await.unwrap();
    }

    assert_eq!(repo.count(None, vec![]).await.unwrap(), 12);
    let admins = repo
        .find_number("count(`email`)", Some("`admin`=?"), vec![json!(true)])
        .await
        .unwrap();
    assert_eq!(admins, Some(json!(0)));

    let page = Page::new(12, 2, 5);
    let users = repo
        .find_all(
            FindAll::new()
                .order_by("`email`")
                .limit(page.limit_clause()),
        )
        .await
        .unwrap();
    assert_eq!(users.len(), 5);
    assert_eq!(users[0].email, "05@example.com");
}

#[tokio::test]
async fn update_and_remove() {
    let (_dir, db) = setup(MutationPolicy::Strict).await;
    let repo = Repo::<User>::new(&db);

    let mut bob = user("bob@example.com", "Bob");
    repo.save(&mut bob).await.unwrap();

    bob.name = "Robert".into();
    bob.admin = Some(true);
    assert_eq!(repo.update(&bob).await.unwrap(), 1);

    let found = repo.find("bob@example.com").await.unwrap().unwrap();
    assert_eq!(found.name, "Robert");
    assert_eq!(found.admin, Some(true));

    assert_eq!(repo.remove(&bob).await.unwrap(), 1);
    assert!(repo.find("bob@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn boolean_column_reads_back_as_bool() {
    let (_dir, db) = setup(MutationPolicy::Strict).await;
    let repo = Repo::<User>::new(&db);

    let mut root = user("root@example.com", "Root");
    root.admin = Some(true);
    repo.save(&mut root).await.unwrap();
    repo.save(&mut user("plain@example.com", "Plain")).await.unwrap();

    let rows = db
        .query("select `admin` from `users` order by `email`", &[], None)
        .await
        .unwrap();
    assert_eq!(rows[0]["admin"], json!(0));
    assert_eq!(rows[1]["admin"], json!(1));

    let admins = repo
        .find_all(FindAll::new().filter("`admin`=?", vec![json!(true)]))
        .await
        .unwrap();
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].admin, Some(true));
    assert_eq!(
        repo.find("plain@example.com").await.unwrap().unwrap().admin,
        Some(false)
    );
}

#[tokio::test]
async fn key_only_update_checks_existence() {
    let (_dir, db) = setup(MutationPolicy::Strict).await;
    let repo = Repo::<Tag>::new(&db);

    let err = repo.update(&Tag { id: 7 }).await.unwrap_err();
    assert!(matches!(
        err,
        OrmError::Conflict {
            operation: "update",
            affected: 0,
            ..
        }
    ));

    repo.save(&mut Tag { id: 7 }).await.unwrap();
    assert_eq!(repo.update(&Tag { id: 7 }).await.unwrap(), 1);
    assert_eq!(repo.find(7).await.unwrap(), Some(Tag { id: 7 }));
}

#[tokio::test]
async fn strict_policy_rejects_missed_mutation() {
    let (_dir, db) = setup(MutationPolicy::Strict).await;
    let repo = Repo::<User>::new(&db);

    let mut ghost = user("ghost@example.com", "Ghost");
    ghost.admin = Some(false);
    ghost.created_at = Some(0.0);

    let err = repo.update(&ghost).await.unwrap_err();
    assert!(matches!(
        err,
        OrmError::Conflict {
            operation: "update",
            affected: 0,
            ..
        }
    ));
}

#[tokio::test]
async fn lenient_policy_reports_count() {
    let (_dir, db) = setup(MutationPolicy::Lenient).await;
    let repo = Repo::<User>::new(&db);

    let ghost = user("ghost@example.com", "Ghost");
    assert_eq!(repo.remove(&ghost).await.unwrap(), 0);
}

#[tokio::test]
async fn duplicate_insert_is_a_query_error() {
    let (_dir, db) = setup(MutationPolicy::Strict).await;
    let repo = Repo::<User>::new(&db);

    let mut first = user("dup@example.com", "First");
    repo.save(&mut first).await.unwrap();

    let mut second = user("dup@example.com", "Second");
    let err = repo.save(&mut second).await.unwrap_err();
    assert!(matches!(err, OrmError::Query { .. }));
    assert!(err.is_unique_violation());
}

#[tokio::test]
#[ignore = "requires database"]
async fn mysql_round_trip() {
    // Run with: DATABASE_URL=mysql://... cargo test -p quill-orm -- --ignored
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let db = Executor::new(Pool::create(&DatabaseConfig::from_url(url)).await.unwrap());
    register::<User>().unwrap();

    let repo = Repo::<User>::new(&db);
    let mut u = user("mysql@example.com", "My");
    repo.save(&mut u).await.unwrap();
    assert_eq!(repo.find("mysql@example.com").await.unwrap().unwrap().name, "My");
    repo.remove(&u).await.unwrap();
}

use super::{new_user, seed_user};
use bearpost::model::user::{User, UserUpdate};
use bearpost::repository::user::UserRepository;
use sqlx::PgPool;

fn change(user: &User) -> UserUpdate {
    UserUpdate {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        password_hash: None,
        admin: user.admin,
    }
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_create_find_and_exists(pool: PgPool) {
    let users = UserRepository::new(pool.clone());
    let created = users.create(&new_user("ada", false)).await.unwrap();

    assert_eq!(users.find_by_id(created.id).await.unwrap(), created);
    assert_eq!(users.find_by_username("ada").await.unwrap().id, created.id);
    assert!(users.find_by_username("grace").await.unwrap_err().is_not_found());

    assert!(users.exists("ada@example.com").await);
    assert!(!users.exists("grace@example.com").await);
    assert!(users.exists_username("ada").await);
    assert!(!users.exists_username("grace").await);

    assert_eq!(users.get_all().await.unwrap(), vec![created]);
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_duplicate_username_is_a_conflict(pool: PgPool) {
    let users = UserRepository::new(pool.clone());
    users.create(&new_user("ada", false)).await.unwrap();

    let mut again = new_user("ada", false);
    again.email = None;
    let err = users.create(&again).await.unwrap_err();
    assert_eq!(err.code(), 409);
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_sole_admin_cannot_be_deleted(pool: PgPool) {
    let users = UserRepository::new(pool.clone());
    let first = seed_user(&pool, "first", true).await;

    let err = users.delete(first.id).await.unwrap_err();
    assert_eq!(err.code(), 409);
    assert_eq!(err.to_string(), "Conflict: cannot delete only admin");
    assert!(users.find_by_id(first.id).await.is_ok());

    let second = seed_user(&pool, "second", true).await;
    let deleted = users.delete(first.id).await.unwrap();
    assert_eq!(deleted.id, first.id);

    let err = users.delete(second.id).await.unwrap_err();
    assert_eq!(err.code(), 409);
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_sole_admin_cannot_be_demoted(pool: PgPool) {
    let users = UserRepository::new(pool.clone());
    let first = seed_user(&pool, "first", true).await;

    let mut demote = change(&first);
    demote.admin = false;
    let err = users.update(&demote).await.unwrap_err();
    assert_eq!(err.to_string(), "Conflict: cannot remove only admin");
    assert!(users.find_by_id(first.id).await.unwrap().admin);

    // Keeping the role while editing other fields is always allowed.
    let mut rename = change(&first);
    rename.name = "Renamed".to_string();
    assert_eq!(users.update(&rename).await.unwrap().name, "Renamed");

    seed_user(&pool, "second", true).await;
    assert!(!users.update(&demote).await.unwrap().admin);
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_non_admins_are_not_guarded(pool: PgPool) {
    let users = UserRepository::new(pool.clone());
    let reader = seed_user(&pool, "reader", false).await;

    let deleted = users.delete(reader.id).await.unwrap();
    assert_eq!(deleted.username, "reader");
    assert!(users.find_by_id(reader.id).await.unwrap_err().is_not_found());
    assert!(users.delete(reader.id).await.unwrap_err().is_not_found());
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_demotions_leave_one_admin(pool: PgPool) {
    let users = UserRepository::new(pool.clone());
    let a = seed_user(&pool, "alpha", true).await;
    let b = seed_user(&pool, "beta", true).await;

    let mut demote_a = change(&a);
    demote_a.admin = false;
    let mut demote_b = change(&b);
    demote_b.admin = false;

    let (ra, rb) = tokio::join!(users.update(&demote_a), users.update(&demote_b));
    assert_eq!(ra.is_ok() as u8 + rb.is_ok() as u8, 1);

    let admins = users.get_all().await.unwrap().into_iter().filter(|u| u.admin).count();
    assert_eq!(admins, 1);
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_password_is_replaced_only_when_given(pool: PgPool) {
    let users = UserRepository::new(pool.clone());
    let user = seed_user(&pool, "ada", false).await;

    let mut update = change(&user);
    update.email = None;
    let updated = users.update(&update).await.unwrap();
    assert_eq!(updated.password, user.password);
    assert_eq!(updated.email, None);
    assert!(updated.updated_at.is_some());

    update.password_hash = Some("$argon2id$v=19$m=19456,t=2,p=1$bmV3c2FsdA$bmV3aGFzaA".to_string());
    let updated = users.update(&update).await.unwrap();
    assert_ne!(updated.password, user.password);
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_first_admin_is_created_once(pool: PgPool) {
    let users = UserRepository::new(pool.clone());

    let admin = users
        .create_first_admin(&new_user("root", false))
        .await
        .unwrap()
        .unwrap();
    assert!(admin.admin);

    let refused = users.create_first_admin(&new_user("other", false)).await.unwrap();
    assert!(refused.is_none());
    assert!(!users.exists_username("other").await);
}

#[sqlx::test(migrator = "bearpost::config::db::MIGRATOR")]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_failed_user_lookup_reports_taken(pool: PgPool) {
    let users = UserRepository::new(pool.clone());
    assert!(!users.exists("nobody@example.com").await);
    assert!(!users.exists_username("nobody").await);

    pool.close().await;
    assert!(users.exists("nobody@example.com").await);
    assert!(users.exists_username("nobody").await);
}

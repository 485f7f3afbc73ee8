use sqlx::{SqliteConnection, SqlitePool};

use crate::db::{
    models::{NewUser, ROLE_USER, StoryDraft},
    stories, users,
};
use crate::error::AppError;
use crate::security::password::hash_password;

struct DemoUser {
    email: &'static str,
    username: &'static str,
    display_name: &'static str,
    password: &'static str,
}

const DEMO_USERS: &[DemoUser] = &[
    DemoUser {
        email: "john.doe@example.com",
        username: "johndoe",
        display_name: "John Doe",
        password: "password123",
    },
    DemoUser {
        email: "jane.smith@example.com",
        username: "janesmith",
        display_name: "Jane Smith",
        password: "password123",
    },
    DemoUser {
        email: "admin@example.com",
        username: "admin",
        display_name: "Admin User",
        password: "admin123",
    },
];

fn demo_stories() -> [StoryDraft; 2] {
    [
        StoryDraft {
            title: "My First Story".to_string(),
            description: "This is my first story on the shelf!".to_string(),
            content: "Once upon a time, in a village by the sea...".to_string(),
            tags: vec!["adventure".to_string(), "fantasy".to_string()],
            published: true,
        },
        StoryDraft {
            title: "Another Story".to_string(),
            description: "This is another story I wrote.".to_string(),
            content: "In a world where magic exists, nothing is simple.".to_string(),
            tags: vec!["fantasy".to_string(), "mystery".to_string()],
            published: true,
        },
    ]
}

async fn is_present(conn: &mut SqliteConnection, demo: &DemoUser) -> Result<bool, sqlx::Error> {
    Ok(users::exists_by_email(conn, demo.email).await?
        || users::exists_by_username(conn, demo.username).await?)
}

/// Creates the demo accounts (and two published stories each) whose email
/// and username are both free. Safe to run on every startup.
pub async fn seed_demo_data(pool: &SqlitePool) -> Result<usize, AppError> {
    let mut created = 0;

    for demo in DEMO_USERS {
        let mut conn = pool.acquire().await?;
        let present = is_present(&mut conn, demo).await?;
        drop(conn);
        if present {
            tracing::debug!(username = demo.username, "demo user already present");
            continue;
        }

        let password = demo.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(password))
            .await
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))??;

        let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;
        // Checked again under the write lock
        if is_present(&mut tx, demo).await? {
            continue;
        }

        let user_id = users::insert_user(
            &mut tx,
            &NewUser {
                username: demo.username.to_string(),
                email: demo.email.to_string(),
                password_hash,
                display_name: Some(demo.display_name.to_string()),
                bio: None,
                email_verified: true,
            },
        )
        .await?;
        users::add_role(&mut tx, user_id, ROLE_USER).await?;

        for draft in demo_stories() {
            stories::insert_story(&mut tx, user_id, &draft).await?;
        }

        tx.commit().await?;
        tracing::info!(username = demo.username, "seeded demo user");
        created += 1;
    }

    Ok(created)
}

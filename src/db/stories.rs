use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::db::models::{Page, PageRequest, Story, StoryDraft};

const STORY_SELECT: &str = r#"
    SELECT s.id, s.title, s.description, s.content, s.author_id,
           u.username AS author_username, u.display_name AS author_display_name,
           s.published, s.views, s.likes, s.rating, s.created_at, s.updated_at
    FROM stories s
    JOIN users u ON u.id = s.author_id
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorySort {
    #[default]
    Newest,
    Oldest,
    /// Most viewed first
    Popular,
    Rating,
    Likes,
}

impl StorySort {
    /// Unknown or missing keys fall back to `Newest`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("oldest") => StorySort::Oldest,
            Some("popular") | Some("views") => StorySort::Popular,
            Some("rating") => StorySort::Rating,
            Some("likes") => StorySort::Likes,
            _ => StorySort::Newest,
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            StorySort::Newest => "s.created_at DESC, s.id DESC",
            StorySort::Oldest => "s.created_at ASC, s.id ASC",
            StorySort::Popular => "s.views DESC, s.id DESC",
            StorySort::Rating => "s.rating DESC, s.id DESC",
            StorySort::Likes => "s.likes DESC, s.id DESC",
        }
    }
}

/// Restricts a listing of published stories.
#[derive(Debug, Clone, Copy)]
pub enum StoryFilter<'a> {
    All,
    Tag(&'a str),
    /// Substring of title or description, case-insensitive
    Search(&'a str),
}

fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn push_published_filter<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: StoryFilter<'a>) {
    qb.push(" WHERE s.published = 1");
    match filter {
        StoryFilter::All => {}
        StoryFilter::Tag(tag) => {
            qb.push(" AND EXISTS (SELECT 1 FROM story_tags t WHERE t.story_id = s.id AND t.tag = ")
                .push_bind(tag)
                .push(")");
        }
        StoryFilter::Search(query) => {
            let pattern = like_pattern(query);
            qb.push(" AND (s.title LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR s.description LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
    }
}

pub async fn tags_for(conn: &mut SqliteConnection, story_id: i64) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT tag FROM story_tags WHERE story_id = ? ORDER BY tag")
        .bind(story_id)
        .fetch_all(&mut *conn)
        .await
}

async fn attach_tags(conn: &mut SqliteConnection, stories: &mut [Story]) -> Result<(), sqlx::Error> {
    for story in stories.iter_mut() {
        story.tags = tags_for(conn, story.id).await?;
    }
    Ok(())
}

pub async fn replace_tags(
    conn: &mut SqliteConnection,
    story_id: i64,
    tags: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM story_tags WHERE story_id = ?")
        .bind(story_id)
        .execute(&mut *conn)
        .await?;

    for tag in tags {
        sqlx::query("INSERT OR IGNORE INTO story_tags (story_id, tag) VALUES (?, ?)")
            .bind(story_id)
            .bind(tag)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

pub async fn insert_story(
    conn: &mut SqliteConnection,
    author_id: i64,
    draft: &StoryDraft,
) -> Result<i64, sqlx::Error> {
    let now = Utc::now();
    let id = sqlx::query(
        r#"
        INSERT INTO stories (title, description, content, author_id, published, views, likes,
                             rating, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 0, 0, 0, ?, ?)
        "#,
    )
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(&draft.content)
    .bind(author_id)
    .bind(draft.published)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    replace_tags(conn, id, &draft.tags).await?;
    Ok(id)
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<Story>, sqlx::Error> {
    let story = sqlx::query_as::<_, Story>(&format!("{STORY_SELECT} WHERE s.id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match story {
        Some(mut story) => {
            story.tags = tags_for(conn, story.id).await?;
            Ok(Some(story))
        }
        None => Ok(None),
    }
}

pub async fn update_story(
    conn: &mut SqliteConnection,
    id: i64,
    draft: &StoryDraft,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE stories
        SET title = ?, description = ?, content = ?, published = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(&draft.content)
    .bind(draft.published)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    replace_tags(conn, id, &draft.tags).await
}

pub async fn set_published(
    conn: &mut SqliteConnection,
    id: i64,
    published: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE stories SET published = ?, updated_at = ? WHERE id = ?")
        .bind(published)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn delete_story(conn: &mut SqliteConnection, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM stories WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Only published stories accumulate views.
pub async fn increment_views(conn: &mut SqliteConnection, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE stories SET views = views + 1 WHERE id = ? AND published = 1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn adjust_likes(conn: &mut SqliteConnection, id: i64, delta: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE stories SET likes = MAX(likes + ?, 0) WHERE id = ?")
        .bind(delta)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn likes_count(conn: &mut SqliteConnection, id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT likes FROM stories WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await
}

pub async fn set_rating(conn: &mut SqliteConnection, id: i64, rating: f64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE stories SET rating = ? WHERE id = ?")
        .bind(rating)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn list_published(
    conn: &mut SqliteConnection,
    filter: StoryFilter<'_>,
    sort: StorySort,
    page: PageRequest,
) -> Result<Page<Story>, sqlx::Error> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM stories s");
    push_published_filter(&mut count, filter);
    let total = count.build_query_scalar::<i64>().fetch_one(&mut *conn).await?;

    let mut select = QueryBuilder::<Sqlite>::new(STORY_SELECT);
    push_published_filter(&mut select, filter);
    select
        .push(" ORDER BY ")
        .push(sort.order_by())
        .push(" LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let mut items = select.build_query_as::<Story>().fetch_all(&mut *conn).await?;
    attach_tags(conn, &mut items).await?;

    Ok(Page {
        items,
        request: page,
        total,
    })
}

/// First `limit` published stories in `sort` order.
pub async fn top_published(
    conn: &mut SqliteConnection,
    sort: StorySort,
    limit: i64,
) -> Result<Vec<Story>, sqlx::Error> {
    let mut items = sqlx::query_as::<_, Story>(&format!(
        "{STORY_SELECT} WHERE s.published = 1 ORDER BY {} LIMIT ?",
        sort.order_by()
    ))
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    attach_tags(conn, &mut items).await?;
    Ok(items)
}

pub async fn list_by_author(
    conn: &mut SqliteConnection,
    author_id: i64,
    include_unpublished: bool,
) -> Result<Vec<Story>, sqlx::Error> {
    let mut items = sqlx::query_as::<_, Story>(&format!(
        "{STORY_SELECT} WHERE s.author_id = ? AND (s.published = 1 OR ?) \
         ORDER BY s.created_at DESC, s.id DESC"
    ))
    .bind(author_id)
    .bind(include_unpublished)
    .fetch_all(&mut *conn)
    .await?;

    attach_tags(conn, &mut items).await?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, test_user};

    fn draft(title: &str, tags: &[&str], published: bool) -> StoryDraft {
        StoryDraft {
            title: title.to_string(),
            description: format!("{title} description"),
            content: format!("{title} content goes here"),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            published,
        }
    }

    #[test]
    fn test_sort_parse_falls_back_to_newest() {
        assert_eq!(StorySort::parse(Some("popular")), StorySort::Popular);
        assert_eq!(StorySort::parse(Some(" Rating ")), StorySort::Rating);
        assert_eq!(StorySort::parse(Some("likes")), StorySort::Likes);
        assert_eq!(StorySort::parse(Some("sideways")), StorySort::Newest);
        assert_eq!(StorySort::parse(None), StorySort::Newest);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("dragon"), "%dragon%");
        assert_eq!(like_pattern("100%_done"), "%100\\%\\_done%");
    }

    #[tokio::test]
    async fn test_insert_and_load_with_tags() {
        let pool = test_pool().await;
        let author = test_user(&pool, "writer").await;
        let mut conn = pool.acquire().await.unwrap();

        let id = insert_story(&mut conn, author, &draft("Sea", &["ocean", "adventure"], true))
            .await
            .unwrap();
        let story = find_by_id(&mut conn, id).await.unwrap().unwrap();

        assert_eq!(story.author_username, "writer");
        assert_eq!(story.tags, vec!["adventure", "ocean"]);
        assert!(story.published);
        assert_eq!(story.views, 0);
    }

    #[tokio::test]
    async fn test_listing_hides_unpublished_and_filters_by_tag() {
        let pool = test_pool().await;
        let author = test_user(&pool, "writer").await;
        let mut conn = pool.acquire().await.unwrap();

        insert_story(&mut conn, author, &draft("Visible", &["fantasy"], true)).await.unwrap();
        insert_story(&mut conn, author, &draft("Hidden", &["fantasy"], false)).await.unwrap();
        insert_story(&mut conn, author, &draft("Other", &["horror"], true)).await.unwrap();

        let all = list_published(&mut conn, StoryFilter::All, StorySort::Newest, PageRequest::new(None, None))
            .await
            .unwrap();
        assert_eq!(all.total, 2);

        let fantasy = list_published(
            &mut conn,
            StoryFilter::Tag("fantasy"),
            StorySort::Newest,
            PageRequest::new(None, None),
        )
        .await
        .unwrap();
        assert_eq!(fantasy.total, 1);
        assert_eq!(fantasy.items[0].title, "Visible");
    }

    #[tokio::test]
    async fn test_search_matches_title_or_description_ignoring_case() {
        let pool = test_pool().await;
        let author = test_user(&pool, "writer").await;
        let mut conn = pool.acquire().await.unwrap();

        insert_story(&mut conn, author, &draft("The Dragon Keeper", &[], true)).await.unwrap();
        let mut by_desc = draft("Quiet Town", &[], true);
        by_desc.description = "A tale about a DRAGON egg".to_string();
        insert_story(&mut conn, author, &by_desc).await.unwrap();
        insert_story(&mut conn, author, &draft("Unrelated", &[], true)).await.unwrap();

        let found = list_published(
            &mut conn,
            StoryFilter::Search("dragon"),
            StorySort::Oldest,
            PageRequest::new(None, None),
        )
        .await
        .unwrap();

        let titles: Vec<_> = found.items.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["The Dragon Keeper", "Quiet Town"]);
    }

    #[tokio::test]
    async fn test_views_only_count_on_published_stories() {
        let pool = test_pool().await;
        let author = test_user(&pool, "writer").await;
        let mut conn = pool.acquire().await.unwrap();

        let draft_id = insert_story(&mut conn, author, &draft("Draft", &[], false)).await.unwrap();
        assert!(!increment_views(&mut conn, draft_id).await.unwrap());

        set_published(&mut conn, draft_id, true).await.unwrap();
        assert!(increment_views(&mut conn, draft_id).await.unwrap());
        assert_eq!(find_by_id(&mut conn, draft_id).await.unwrap().unwrap().views, 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_tags() {
        let pool = test_pool().await;
        let author = test_user(&pool, "writer").await;
        let mut conn = pool.acquire().await.unwrap();

        let id = insert_story(&mut conn, author, &draft("Gone", &["a", "b"], true)).await.unwrap();
        assert!(delete_story(&mut conn, id).await.unwrap());
        assert!(tags_for(&mut conn, id).await.unwrap().is_empty());
        assert!(!delete_story(&mut conn, id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_likes_and_ratings() {
        use crate::db::{comments, likes, ratings};

        let pool = test_pool().await;
        let author = test_user(&pool, "writer").await;
        let reader = test_user(&pool, "reader").await;
        let mut conn = pool.acquire().await.unwrap();

        let id = insert_story(&mut conn, author, &draft("Doomed", &[], true)).await.unwrap();
        let comment_id = comments::insert_comment(&mut conn, id, reader, "Enjoyed it")
            .await
            .unwrap();
        likes::insert_story_like(&mut conn, reader, id).await.unwrap();
        likes::insert_comment_like(&mut conn, author, comment_id).await.unwrap();
        ratings::upsert_rating(&mut conn, reader, id, 4.0).await.unwrap();

        assert!(delete_story(&mut conn, id).await.unwrap());

        for (sql, target) in [
            ("SELECT COUNT(*) FROM story_likes WHERE story_id = ?", id),
            ("SELECT COUNT(*) FROM story_ratings WHERE story_id = ?", id),
            ("SELECT COUNT(*) FROM comments WHERE story_id = ?", id),
            ("SELECT COUNT(*) FROM comment_likes WHERE comment_id = ?", comment_id),
        ] {
            let left: i64 = sqlx::query_scalar(sql)
                .bind(target)
                .fetch_one(&mut *conn)
                .await
                .unwrap();
            assert_eq!(left, 0, "{sql}");
        }
    }
}

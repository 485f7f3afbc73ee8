use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use crate::api::dto::{PageDto, StoryDto};
use crate::api::extract::{ApiPath, ApiQuery, AuthUser, MaybeAuthUser, ValidatedJson};
use crate::api::server::AppState;
use crate::db::models::{Page, PageRequest, Story, User};
use crate::db::stories::StorySort;
use crate::error::Result;
use crate::services::stories::{RatingInput, StoryInput};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub sort: Option<String>,
    pub tag: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

async fn story_page(
    state: &AppState,
    page: Page<Story>,
    viewer: Option<&User>,
) -> Result<PageDto<StoryDto>> {
    let Page {
        items,
        request,
        total,
    } = page;
    let items = state.stories.annotate(items, viewer).await?;
    Ok(PageDto::from_page(Page {
        items,
        request,
        total,
    }))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    viewer: MaybeAuthUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<PageDto<StoryDto>>> {
    let page = state
        .stories
        .list(
            StorySort::parse(params.sort.as_deref()),
            params.tag.as_deref(),
            PageRequest::new(params.page, params.size),
        )
        .await?;
    Ok(Json(story_page(&state, page, viewer.user()).await?))
}

pub async fn by_tag(
    State(state): State<Arc<AppState>>,
    viewer: MaybeAuthUser,
    ApiPath(tag): ApiPath<String>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<PageDto<StoryDto>>> {
    let page = state
        .stories
        .list(
            StorySort::parse(params.sort.as_deref()),
            Some(&tag),
            PageRequest::new(params.page, params.size),
        )
        .await?;
    Ok(Json(story_page(&state, page, viewer.user()).await?))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    viewer: MaybeAuthUser,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> Result<Json<PageDto<StoryDto>>> {
    let page = state
        .stories
        .search(&params.query, PageRequest::new(params.page, params.size))
        .await?;
    Ok(Json(story_page(&state, page, viewer.user()).await?))
}

pub async fn top_rated(State(state): State<Arc<AppState>>) -> Result<Json<Vec<StoryDto>>> {
    let stories = state.stories.top_rated().await?;
    Ok(Json(stories.into_iter().map(StoryDto::from).collect()))
}

pub async fn most_viewed(State(state): State<Arc<AppState>>) -> Result<Json<Vec<StoryDto>>> {
    let stories = state.stories.most_viewed().await?;
    Ok(Json(stories.into_iter().map(StoryDto::from).collect()))
}

pub async fn by_author(
    State(state): State<Arc<AppState>>,
    viewer: MaybeAuthUser,
    ApiPath(author_id): ApiPath<i64>,
) -> Result<Json<Vec<StoryDto>>> {
    let stories = state.stories.by_author(author_id, viewer.user()).await?;
    let views = state.stories.annotate(stories, viewer.user()).await?;
    Ok(Json(views.into_iter().map(StoryDto::from).collect()))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    viewer: MaybeAuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<StoryDto>> {
    Ok(Json(state.stories.get(id, viewer.user()).await?.into()))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidatedJson(payload): ValidatedJson<StoryInput>,
) -> Result<(StatusCode, Json<StoryDto>)> {
    let story = state.stories.create(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(story.into())))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(payload): ValidatedJson<StoryInput>,
) -> Result<Json<StoryDto>> {
    Ok(Json(state.stories.update(id, &user, payload).await?.into()))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode> {
    state.stories.delete(id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn publish(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<StoryDto>> {
    Ok(Json(state.stories.publish(id, &user).await?.into()))
}

pub async fn unpublish(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<StoryDto>> {
    Ok(Json(state.stories.unpublish(id, &user).await?.into()))
}

pub async fn rate(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(payload): ValidatedJson<RatingInput>,
) -> Result<Json<StoryDto>> {
    state.stories.rate(id, &user, payload).await?;
    Ok(Json(state.stories.get(id, Some(&user)).await?.into()))
}

pub async fn view(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<StoryDto>> {
    Ok(Json(state.stories.increment_views(id).await?.into()))
}

#[cfg(test)]
mod tests {
    use crate::api::server::tests::{register, send, test_app};
    use axum::Router;
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    async fn create_story(app: &Router, token: &str, title: &str, tags: &[&str], published: bool) -> Value {
        let (status, body) = send(
            app,
            "POST",
            "/api/stories",
            Some(token),
            Some(json!({
                "title": title,
                "description": "A description that is long enough",
                "content": "Some content that is long enough to pass",
                "tags": tags,
                "published": published,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    #[tokio::test]
    async fn test_story_lifecycle_and_ownership() {
        let app = test_app().await;
        let author = register(&app, "author").await;
        let other = register(&app, "other").await;

        let story = create_story(&app, &author, "Draft Tale", &["Fantasy"], false).await;
        let id = story["id"].as_i64().unwrap();
        assert_eq!(story["author"]["username"], "author");
        assert_eq!(story["tags"], json!(["fantasy"]));

        let (status, _) = send(&app, "GET", &format!("/api/stories/{id}"), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            send(&app, "POST", &format!("/api/stories/{id}/publish"), Some(other.as_str()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");

        let (status, body) =
            send(&app, "POST", &format!("/api/stories/{id}/publish"), Some(author.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["published"], true);

        let (status, page) = send(&app, "GET", "/api/stories?tag=fantasy", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total_elements"], 1);
        assert_eq!(page["size"], 9);

        let (status, _) =
            send(&app, "DELETE", &format!("/api/stories/{id}"), Some(other.as_str()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) =
            send(&app, "DELETE", &format!("/api/stories/{id}"), Some(author.as_str()), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_popular_listing_orders_by_views() {
        let app = test_app().await;
        let token = register(&app, "writer").await;

        let a = create_story(&app, &token, "Story A", &[], true).await["id"].as_i64().unwrap();
        let b = create_story(&app, &token, "Story B", &[], true).await["id"].as_i64().unwrap();

        for _ in 0..3 {
            send(&app, "POST", &format!("/api/stories/{a}/view"), None, None).await;
        }
        send(&app, "POST", &format!("/api/stories/{b}/view"), None, None).await;

        let (_, page) = send(&app, "GET", "/api/stories?sort=popular", None, None).await;
        let ids: Vec<i64> = page["content"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(page["content"][0]["views"], 3);
    }

    #[tokio::test]
    async fn test_search_rate_and_like_flag() {
        let app = test_app().await;
        let author = register(&app, "author").await;
        let reader = register(&app, "reader").await;

        let id = create_story(&app, &author, "The Lighthouse", &[], true).await["id"]
            .as_i64()
            .unwrap();
        create_story(&app, &author, "Something Else", &[], true).await;

        let (status, found) = send(&app, "GET", "/api/stories/search?query=lighthouse", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["total_elements"], 1);

        let (status, _) = send(&app, "GET", "/api/stories/search?query=", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, rated) = send(
            &app,
            "POST",
            &format!("/api/stories/{id}/rate"),
            Some(reader.as_str()),
            Some(json!({"rating": 4.0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rated["rating"], 4.0);
        assert_eq!(rated["my_rating"], 4.0);

        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/stories/{id}/rate"),
            Some(reader.as_str()),
            Some(json!({"rating": 6})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        send(&app, "POST", &format!("/api/stories/{id}/like"), Some(reader.as_str()), None).await;
        let (_, story) = send(&app, "GET", &format!("/api/stories/{id}"), Some(reader.as_str()), None).await;
        assert_eq!(story["liked"], true);
        assert_eq!(story["likes"], 1);

        let (_, top) = send(&app, "GET", "/api/stories/top-rated", None, None).await;
        assert_eq!(top[0]["id"], id);
    }
}

use std::collections::HashMap;
use std::str::FromStr;

use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::web::{Data, Json, Path};
use actix_web::{HttpRequest, HttpResponse};
use futures_util::TryStreamExt;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, query_scalar, PgConnection, PgPool, QueryBuilder};

use crate::context::UserInfo;
use crate::error::Error;
use crate::handlers::upload::{self, MAX_IMAGES_PER_POLL};
use crate::models::poll::{Creator, Poll, PollComment, PollDetail, PollOption, PollType};
use crate::response::{DeleteResponse, List, Message};
use crate::storer::FileStorer;

const TRENDING_LIMIT: i64 = 5;

/// Option labels arrive as one JSON-encoded array in a multipart text field.
fn parse_options(raw: &str) -> Result<Vec<String>, Error> {
    let options: Vec<String> =
        serde_json::from_str(raw).map_err(|_| Error::Validation("options must be a JSON array of strings".into()))?;
    if options.iter().any(|o| o.trim().is_empty()) {
        return Err(Error::Validation("option labels must not be empty".into()));
    }
    Ok(options)
}

fn option_in_range(index: i32, count: i64) -> bool {
    index >= 0 && i64::from(index) < count
}

async fn read_text_field(field: &mut actix_multipart::Field) -> Result<String, Error> {
    let mut content = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        content.extend_from_slice(&chunk);
    }
    String::from_utf8(content).map_err(|_| Error::Validation("form fields must be valid UTF-8".into()))
}

/// Joins options, voters, comments and creator identities onto a page of
/// poll rows, preserving the input order.
async fn hydrate_polls(conn: &mut PgConnection, polls: Vec<Poll>) -> Result<Vec<PollDetail>, Error> {
    if polls.is_empty() {
        return Ok(Vec::new());
    }
    let poll_ids: Vec<i64> = polls.iter().map(|p| p.id).collect();
    let creator_ids: Vec<i64> = polls.iter().map(|p| p.created_by).unique().collect();

    let options: Vec<(i64, String, i64)> =
        query_as("SELECT poll_id, text, votes FROM poll_options WHERE poll_id = ANY($1) ORDER BY poll_id, idx")
            .bind(&poll_ids)
            .fetch_all(&mut *conn)
            .await?;
    let votes: Vec<(i64, i64, Option<String>)> =
        query_as("SELECT poll_id, user_id, comment FROM votes WHERE poll_id = ANY($1) ORDER BY created_at")
            .bind(&poll_ids)
            .fetch_all(&mut *conn)
            .await?;
    let creators: Vec<(i64, String, String)> =
        query_as("SELECT id, username, profile_image_url FROM users WHERE id = ANY($1)")
            .bind(&creator_ids)
            .fetch_all(&mut *conn)
            .await?;

    let mut options_by_poll: HashMap<i64, Vec<PollOption>> = HashMap::new();
    for (poll_id, text, votes) in options {
        options_by_poll.entry(poll_id).or_default().push(PollOption { text, votes });
    }
    let mut voters_by_poll: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut comments_by_poll: HashMap<i64, Vec<PollComment>> = HashMap::new();
    for (poll_id, user_id, comment) in votes {
        voters_by_poll.entry(poll_id).or_default().push(user_id);
        if let Some(text) = comment {
            comments_by_poll.entry(poll_id).or_default().push(PollComment { user: user_id, text });
        }
    }
    let creators: HashMap<i64, Creator> = creators
        .into_iter()
        .map(|(id, username, profile_image_url)| {
            (
                id,
                Creator {
                    id,
                    username,
                    profile_image_url,
                },
            )
        })
        .collect();

    polls
        .into_iter()
        .map(|poll| {
            let created_by = creators
                .get(&poll.created_by)
                .cloned()
                .ok_or_else(|| Error::NotFound("poll creator not found".into()))?;
            Ok(PollDetail {
                id: poll.id,
                question: poll.question,
                poll_type: poll.poll_type,
                options: options_by_poll.remove(&poll.id).unwrap_or_default(),
                images: poll.images,
                created_by,
                voters: voters_by_poll.remove(&poll.id).unwrap_or_default(),
                comments: comments_by_poll.remove(&poll.id).unwrap_or_default(),
                created_at: poll.created_at,
                updated_at: poll.updated_at,
            })
        })
        .collect()
}

async fn hydrate_poll(conn: &mut PgConnection, poll: Poll) -> Result<PollDetail, Error> {
    hydrate_polls(conn, vec![poll])
        .await?
        .pop()
        .ok_or_else(|| Error::NotFound("poll not found".into()))
}

#[derive(Debug, Serialize)]
pub struct CreatePollResponse {
    pub message: String,
    pub poll: PollDetail,
}

pub async fn create<S: FileStorer + 'static>(
    user_info: UserInfo,
    req: HttpRequest,
    mut payload: Multipart,
    db: Data<PgPool>,
    storer: Data<S>,
) -> Result<HttpResponse, Error> {
    let mut question = None;
    let mut poll_type = None;
    let mut options_raw = None;
    let mut images = Vec::new();
    while let Some(mut field) = payload.try_next().await? {
        let name = field.content_disposition().get_name().unwrap_or_default().to_owned();
        let is_file = field.content_disposition().get_filename().is_some();
        if is_file {
            if name != "images" {
                return Err(Error::Validation(format!("unexpected file field ({})", name)));
            }
            if images.len() == MAX_IMAGES_PER_POLL {
                return Err(Error::Validation("a poll can carry at most 4 images".into()));
            }
            let (ext, content) = upload::read_image_field(&mut field).await?;
            let stored = storer.write(&ext, content)?;
            images.push(upload::upload_url(&req, &stored));
            continue;
        }
        let value = read_text_field(&mut field).await?;
        match name.as_str() {
            "question" => question = Some(value),
            "pollType" => poll_type = Some(value),
            "options" => options_raw = Some(value),
            _ => {}
        }
    }

    let question = question
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| Error::Validation("question and poll type are required".into()))?;
    let poll_type = poll_type.ok_or_else(|| Error::Validation("question and poll type are required".into()))?;
    let poll_type = PollType::from_str(&poll_type)?;
    let options = match options_raw {
        Some(raw) if poll_type.has_options() => parse_options(&raw)?,
        _ => Vec::new(),
    };
    if poll_type.has_options() && options.is_empty() {
        return Err(Error::Validation("options are required for this poll type".into()));
    }

    let mut tx = db.begin().await?;
    let poll: Poll = query_as(
        "INSERT INTO polls (question, poll_type, images, created_by)
        VALUES ($1, $2, $3, $4)
        RETURNING *",
    )
    .bind(&question)
    .bind(poll_type)
    .bind(&images)
    .bind(user_info.id)
    .fetch_one(&mut tx)
    .await?;
    if !options.is_empty() {
        QueryBuilder::new("INSERT INTO poll_options (poll_id, idx, text) ")
            .push_values(options.into_iter().enumerate(), |mut b, (idx, text)| {
                b.push_bind(poll.id);
                b.push_bind(idx as i32);
                b.push_bind(text);
            })
            .build()
            .execute(&mut tx)
            .await?;
    }
    let poll = hydrate_poll(&mut tx, poll).await?;
    tx.commit().await?;
    Ok(HttpResponse::build(StatusCode::CREATED).json(CreatePollResponse {
        message: "poll created successfully".into(),
        poll,
    }))
}

pub async fn list_all(db: Data<PgPool>) -> Result<Json<List<PollDetail>>, Error> {
    let mut conn = db.acquire().await?;
    let polls: Vec<Poll> = query_as("SELECT * FROM polls ORDER BY created_at DESC")
        .fetch_all(&mut conn)
        .await?;
    let total = polls.len() as i64;
    let polls = hydrate_polls(&mut conn, polls).await?;
    Ok(Json(List::new(polls, total)))
}

pub async fn list_mine(user_info: UserInfo, db: Data<PgPool>) -> Result<Json<List<PollDetail>>, Error> {
    let mut conn = db.acquire().await?;
    let polls: Vec<Poll> = query_as("SELECT * FROM polls WHERE created_by = $1 ORDER BY created_at DESC")
        .bind(user_info.id)
        .fetch_all(&mut conn)
        .await?;
    let total = polls.len() as i64;
    let polls = hydrate_polls(&mut conn, polls).await?;
    Ok(Json(List::new(polls, total)))
}

pub async fn list_voted(user_info: UserInfo, db: Data<PgPool>) -> Result<Json<List<PollDetail>>, Error> {
    let mut conn = db.acquire().await?;
    let polls: Vec<Poll> = query_as(
        "SELECT p.*
        FROM polls AS p
        JOIN votes AS v ON p.id = v.poll_id
        WHERE v.user_id = $1
        ORDER BY v.created_at DESC",
    )
    .bind(user_info.id)
    .fetch_all(&mut conn)
    .await?;
    let total = polls.len() as i64;
    let polls = hydrate_polls(&mut conn, polls).await?;
    Ok(Json(List::new(polls, total)))
}

pub async fn list_bookmarked(user_info: UserInfo, db: Data<PgPool>) -> Result<Json<List<PollDetail>>, Error> {
    let mut conn = db.acquire().await?;
    let polls: Vec<Poll> = query_as(
        "SELECT p.*
        FROM polls AS p
        JOIN bookmarks AS b ON p.id = b.poll_id
        WHERE b.user_id = $1
        ORDER BY b.created_at DESC",
    )
    .bind(user_info.id)
    .fetch_all(&mut conn)
    .await?;
    let total = polls.len() as i64;
    let polls = hydrate_polls(&mut conn, polls).await?;
    Ok(Json(List::new(polls, total)))
}

/// Top polls by total vote count, recomputed on every request.
pub async fn trending(db: Data<PgPool>) -> Result<Json<List<PollDetail>>, Error> {
    let mut conn = db.acquire().await?;
    let polls: Vec<Poll> = query_as(
        "SELECT p.*
        FROM polls AS p
        LEFT JOIN poll_options AS o ON p.id = o.poll_id
        GROUP BY p.id
        ORDER BY COALESCE(SUM(o.votes), 0) DESC
        LIMIT $1",
    )
    .bind(TRENDING_LIMIT)
    .fetch_all(&mut conn)
    .await?;
    let total = polls.len() as i64;
    let polls = hydrate_polls(&mut conn, polls).await?;
    Ok(Json(List::new(polls, total)))
}

pub async fn delete_poll(user_info: UserInfo, poll_id: Path<(i64,)>, db: Data<PgPool>) -> Result<Json<DeleteResponse>, Error> {
    let poll_id = poll_id.into_inner().0;
    let mut conn = db.acquire().await?;
    // only the creator may remove a poll; foreign polls answer like missing ones
    let deleted = query("DELETE FROM polls WHERE id = $1 AND created_by = $2")
        .bind(poll_id)
        .bind(user_info.id)
        .execute(&mut conn)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(Error::NotFound("poll not found".into()));
    }
    Ok(Json(DeleteResponse::new(deleted)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option_index: Option<i32>,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll: Option<PollDetail>,
}

pub async fn vote(
    user_info: UserInfo,
    poll_id: Path<(i64,)>,
    Json(body): Json<VoteRequest>,
    db: Data<PgPool>,
) -> Result<Json<VoteResponse>, Error> {
    let poll_id = poll_id.into_inner().0;
    let mut tx = db.begin().await?;
    let poll: Option<Poll> = query_as("SELECT * FROM polls WHERE id = $1")
        .bind(poll_id)
        .fetch_optional(&mut tx)
        .await?;
    let poll = poll.ok_or_else(|| Error::NotFound("poll not found".into()))?;

    let comment = body.comment.as_deref().map(str::trim).filter(|c| !c.is_empty());
    if poll.poll_type == PollType::OpenEnded && comment.is_some() {
        let inserted = query(
            "INSERT INTO votes (poll_id, user_id, comment) VALUES ($1, $2, $3)
            ON CONFLICT (poll_id, user_id) DO NOTHING",
        )
        .bind(poll_id)
        .bind(user_info.id)
        .bind(comment)
        .execute(&mut tx)
        .await?
        .rows_affected();
        if inserted == 0 {
            return Err(Error::Conflict("you have already responded to this poll".into()));
        }
    } else {
        let option_index = body
            .option_index
            .ok_or_else(|| Error::Validation("optionIndex is required".into()))?;
        let option_count: i64 = query_scalar("SELECT COUNT(*) FROM poll_options WHERE poll_id = $1")
            .bind(poll_id)
            .fetch_one(&mut tx)
            .await?;
        if !option_in_range(option_index, option_count) {
            return Err(Error::Validation("optionIndex is out of range".into()));
        }
        // the (poll_id, user_id) key arbitrates concurrent votes
        let inserted = query(
            "INSERT INTO votes (poll_id, user_id, option_idx) VALUES ($1, $2, $3)
            ON CONFLICT (poll_id, user_id) DO NOTHING",
        )
        .bind(poll_id)
        .bind(user_info.id)
        .bind(option_index)
        .execute(&mut tx)
        .await?
        .rows_affected();
        if inserted == 0 {
            return Ok(Json(VoteResponse {
                message: "you have already voted on this poll".into(),
                poll: None,
            }));
        }
        query("UPDATE poll_options SET votes = votes + 1 WHERE poll_id = $1 AND idx = $2")
            .bind(poll_id)
            .bind(option_index)
            .execute(&mut tx)
            .await?;
    }
    query("UPDATE polls SET updated_at = now() WHERE id = $1")
        .bind(poll_id)
        .execute(&mut tx)
        .await?;
    let poll: Poll = query_as("SELECT * FROM polls WHERE id = $1")
        .bind(poll_id)
        .fetch_one(&mut tx)
        .await?;
    let poll = hydrate_poll(&mut tx, poll).await?;
    tx.commit().await?;
    Ok(Json(VoteResponse {
        message: "vote recorded".into(),
        poll: Some(poll),
    }))
}

pub async fn bookmark(user_info: UserInfo, poll_id: Path<(i64,)>, db: Data<PgPool>) -> Result<Json<Message>, Error> {
    let poll_id = poll_id.into_inner().0;
    let mut tx = db.begin().await?;
    let exists: bool = query_scalar("SELECT EXISTS(SELECT 1 FROM polls WHERE id = $1)")
        .bind(poll_id)
        .fetch_one(&mut tx)
        .await?;
    if !exists {
        return Err(Error::NotFound("poll not found".into()));
    }
    let inserted = query(
        "INSERT INTO bookmarks (user_id, poll_id) VALUES ($1, $2)
        ON CONFLICT (user_id, poll_id) DO NOTHING",
    )
    .bind(user_info.id)
    .bind(poll_id)
    .execute(&mut tx)
    .await?
    .rows_affected();
    tx.commit().await?;
    if inserted == 0 {
        return Ok(Json(Message::new("poll already bookmarked")));
    }
    Ok(Json(Message::new("poll bookmarked")))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_options_accepts_label_array() {
        assert_eq!(parse_options(r#"["Yes", "No"]"#).unwrap(), vec!["Yes", "No"]);
    }

    #[test]
    fn test_parse_options_rejects_non_array_payloads() {
        assert!(parse_options("Yes, No").is_err());
        assert!(parse_options(r#"{"a": 1}"#).is_err());
        assert!(parse_options(r#"[1, 2]"#).is_err());
    }

    #[test]
    fn test_parse_options_rejects_blank_labels() {
        assert!(parse_options(r#"["Yes", "  "]"#).is_err());
    }

    #[test]
    fn test_option_bounds() {
        assert!(option_in_range(0, 2));
        assert!(option_in_range(1, 2));
        assert!(!option_in_range(2, 2));
        assert!(!option_in_range(-1, 2));
        assert!(!option_in_range(0, 0));
    }
}

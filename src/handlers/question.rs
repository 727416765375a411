//! `/api/question`: look up, create and delete trivia questions by id.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use axum::response::Response;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::{PgPool, PreparedStatement, QueryError};
use crate::error::RequestError;
use crate::handlers::{authorize, render, IdParam, PluginContext};
use crate::http::{request, response};
use crate::routing::{PluginDescriptor, PluginLoadError, Request, RequestHandler};
use crate::session::SessionCache;

const SELECT_QUESTION: PreparedStatement = PreparedStatement::new(
    "select_question",
    "SELECT id FROM public.\"Question\" WHERE id = $1 LIMIT 1",
);

// Inserts nothing when the category does not exist.
const CREATE_QUESTION: PreparedStatement = PreparedStatement::new(
    "create_question",
    "INSERT INTO public.\"Question\" (question, answers, correct_answer, category_id) \
     SELECT $1, $2, $3, id FROM public.\"Category\" WHERE id = $4 RETURNING id",
);

const DELETE_QUESTION: PreparedStatement = PreparedStatement::new(
    "delete_question",
    "DELETE FROM public.\"Question\" WHERE id = $1 RETURNING id",
);

const QUESTION_ID: IdParam = IdParam {
    key: "question_id",
    missing: "Invalid question id parameters",
    malformed: "Invalid question id format",
    out_of_range: "Question id out of range",
};

const MISSING_FIELDS: &str =
    "Invalid request: Missing required fields (question | answers | correct_answer | category_id).";
const BAD_TYPES: &str =
    "Invalid request: 'answers' must be an array and 'correct_answer' must be an integer.";
const BAD_ANSWER_INDEX: &str = "Invalid request: 'correct_answer' must be an integer \
     between 0 and the length of 'answers'.";

pub const DESCRIPTOR: PluginDescriptor<PluginContext> = PluginDescriptor {
    name: "question",
    statements: &[SELECT_QUESTION, CREATE_QUESTION, DELETE_QUESTION],
    construct,
};

fn construct(ctx: &PluginContext) -> Result<Arc<dyn RequestHandler>, PluginLoadError> {
    Ok(Arc::new(QuestionHandler::new(
        Arc::clone(&ctx.sessions),
        Arc::clone(&ctx.pool) as Arc<dyn QuestionStore>,
    )))
}

/// A validated question ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub question: String,
    pub answers: Vec<String>,
    pub correct_answer: i32,
    pub category_id: i32,
}

#[async_trait]
pub trait QuestionStore: Send + Sync {
    async fn exists(&self, id: i32) -> Result<bool, QueryError>;

    /// Id of the new question, or `None` when the category is unknown.
    async fn create(&self, question: &NewQuestion) -> Result<Option<i32>, QueryError>;

    /// `false` when there was nothing to delete.
    async fn delete(&self, id: i32) -> Result<bool, QueryError>;
}

#[async_trait]
impl QuestionStore for PgPool {
    async fn exists(&self, id: i32) -> Result<bool, QueryError> {
        let conn = self.acquire().await?;
        Ok(conn.query_opt(SELECT_QUESTION.name, &[&id]).await?.is_some())
    }

    async fn create(&self, question: &NewQuestion) -> Result<Option<i32>, QueryError> {
        let conn = self.acquire().await?;
        let row = conn
            .query_opt(
                CREATE_QUESTION.name,
                &[
                    &question.question,
                    &question.answers,
                    &question.correct_answer,
                    &question.category_id,
                ],
            )
            .await?;
        Ok(row.map(|r| r.try_get::<_, i32>(0)).transpose()?)
    }

    async fn delete(&self, id: i32) -> Result<bool, QueryError> {
        let conn = self.acquire().await?;
        Ok(conn.query_opt(DELETE_QUESTION.name, &[&id]).await?.is_some())
    }
}

/// Body of a `PUT`, checked field by field so each problem gets its message.
#[derive(Debug, Deserialize)]
struct QuestionBody {
    question: Option<String>,
    answers: Option<Value>,
    correct_answer: Option<Value>,
    category_id: Option<i32>,
}

impl QuestionBody {
    fn validate(self) -> Result<NewQuestion, RequestError> {
        let (Some(question), Some(answers), Some(correct_answer), Some(category_id)) = (
            self.question,
            self.answers,
            self.correct_answer,
            self.category_id,
        ) else {
            return Err(RequestError::bad_request(MISSING_FIELDS));
        };

        let answers: Vec<String> =
            serde_json::from_value(answers).map_err(|_| RequestError::bad_request(BAD_TYPES))?;
        let correct_answer = correct_answer
            .as_i64()
            .ok_or_else(|| RequestError::bad_request(BAD_TYPES))?;

        if correct_answer < 0 || correct_answer >= answers.len() as i64 {
            return Err(RequestError::bad_request(BAD_ANSWER_INDEX));
        }

        Ok(NewQuestion {
            question,
            answers,
            correct_answer: correct_answer as i32,
            category_id,
        })
    }
}

pub struct QuestionHandler {
    sessions: Arc<SessionCache>,
    store: Arc<dyn QuestionStore>,
}

impl QuestionHandler {
    pub fn new(sessions: Arc<SessionCache>, store: Arc<dyn QuestionStore>) -> Self {
        Self { sessions, store }
    }

    async fn serve(&self, request: &Request) -> Result<Response, RequestError> {
        match *request.method() {
            Method::GET => self.get(request).await,
            Method::PUT => self.put(request).await,
            Method::DELETE => self.delete(request).await,
            _ => Err(RequestError::bad_request("Invalid request method")),
        }
    }

    async fn get(&self, request: &Request) -> Result<Response, RequestError> {
        let id = QUESTION_ID.parse(request)?;
        if !self.store.exists(id).await? {
            return Err(RequestError::bad_request("Question not found"));
        }
        Ok(response::ok(json!({
            "message": "Question found successfully",
            "question_id": id,
        })))
    }

    async fn put(&self, request: &Request) -> Result<Response, RequestError> {
        let identity = authorize(&self.sessions, request, &["question.put"]).await?;
        let question = request::json_body::<QuestionBody>(request)?.validate()?;

        let id = self
            .store
            .create(&question)
            .await?
            .ok_or_else(|| RequestError::bad_request("Category not found"))?;

        tracing::info!(
            user_id = identity.user_id,
            id,
            category_id = question.category_id,
            "Question created"
        );
        Ok(response::ok(json!({
            "message": "Question created successfully",
            "question": question.question,
        })))
    }

    async fn delete(&self, request: &Request) -> Result<Response, RequestError> {
        let identity = authorize(&self.sessions, request, &["question.delete"]).await?;
        let id = QUESTION_ID.parse(request)?;

        if !self.store.delete(id).await? {
            return Err(RequestError::bad_request("Question not found"));
        }

        tracing::info!(user_id = identity.user_id, id, "Question deleted");
        Ok(response::ok(json!({
            "message": "Question deleted successfully",
        })))
    }
}

#[async_trait]
impl RequestHandler for QuestionHandler {
    fn endpoint_prefix(&self) -> &str {
        "/api/question"
    }

    async fn handle(&self, request: &Request, _client: SocketAddr) -> Response {
        render(self.serve(request).await)
    }
}

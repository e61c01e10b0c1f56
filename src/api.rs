use std::{future::Future, time::Duration};

use reqwest::{
    Client, RequestBuilder, Response,
    multipart::{Form, Part},
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::AppConfig;
use crate::state::{MealPlan, SessionState};

/// Header carrying the user's backend API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Thin wrapper over the Nutri-X backend endpoints.
///
/// Each operation builds its request from the current [`SessionState`]
/// and hands back a future that owns everything it needs, so the state can
/// be changed while calls are in flight. Responses are returned untouched;
/// transport failures and non-2xx statuses come back as `reqwest::Error`.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct RecommendBody<'a> {
    ingredients: &'a [String],
    user_profile: Value,
}

#[derive(Serialize)]
struct EvaluateBody<'a> {
    plan: &'a MealPlan,
}

impl ApiClient {
    pub fn new(cfg: &AppConfig) -> reqwest::Result<Self> {
        Self::with_timeout(&cfg.api_base, cfg.timeout)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST to `path`, attaching the API key when the state holds one.
    /// An unusable key surfaces as an error from `send`.
    fn post(&self, state: &SessionState, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let key = state.api_key();
        let with_key = !key.is_empty();
        tracing::debug!(method = "POST", %url, with_key, "building request");

        let req = self.client.post(url);
        if with_key {
            req.header(API_KEY_HEADER, key)
        } else {
            req
        }
    }

    /// `POST /identify` with a multipart body, usually from [`image_form`].
    pub fn identify_ingredients(
        &self,
        state: &SessionState,
        form: Form,
    ) -> impl Future<Output = reqwest::Result<Response>> + use<> {
        dispatch(self.post(state, "/identify").multipart(form))
    }

    /// `POST /recommend`; a missing profile is sent as `{}`.
    pub fn recommend_recipes(
        &self,
        state: &SessionState,
        ingredients: &[String],
        user_profile: Option<Value>,
    ) -> impl Future<Output = reqwest::Result<Response>> + use<> {
        let body = RecommendBody {
            ingredients,
            user_profile: user_profile.unwrap_or_else(|| Value::Object(Map::new())),
        };
        dispatch(self.post(state, "/recommend").json(&body))
    }

    pub fn evaluate_meal_plan(
        &self,
        state: &SessionState,
        plan: &MealPlan,
    ) -> impl Future<Output = reqwest::Result<Response>> + use<> {
        dispatch(self.post(state, "/evaluate").json(&EvaluateBody { plan }))
    }
}

/// Multipart form with the single `file` part the identify endpoint reads.
pub fn image_form(file_name: impl Into<String>, bytes: Vec<u8>) -> Form {
    Form::new().part("file", Part::bytes(bytes).file_name(file_name.into()))
}

async fn dispatch(req: RequestBuilder) -> reqwest::Result<Response> {
    let resp = req.send().await?;
    tracing::debug!(status = %resp.status(), url = %resp.url(), "response received");
    resp.error_for_status()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MealSlot;
    use crate::storage::MemoryStore;
    use httpmock::MockServer;
    use reqwest::StatusCode;
    use serde_json::json;

    fn state_with_key(key: &str) -> SessionState {
        let mut state = SessionState::new(Box::new(MemoryStore::default())).unwrap();
        state.set_api_key(key).unwrap();
        state
    }

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::with_timeout(&server.url("/api"), Duration::from_secs(60)).unwrap()
    }

    fn ingredients(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn key_header_attached_when_present() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/api/recommend")
                    .header("x-api-key", "secret");
                then.status(200).json_body(json!({"status": "success", "data": []}));
            })
            .await;

        let state = state_with_key("secret");
        let resp = client_for(&server)
            .recommend_recipes(&state, &ingredients(&["egg"]), None)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn key_header_absent_when_empty() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/api/evaluate")
                    .header_missing("x-api-key");
                then.status(200).json_body(json!({"status": "success", "report": ""}));
            })
            .await;

        let state = state_with_key("");
        let plan = MealPlan::default();
        client_for(&server)
            .evaluate_meal_plan(&state, &plan)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn recommend_without_profile_sends_empty_object() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/api/recommend")
                    .json_body(json!({"ingredients": ["egg", "rice"], "user_profile": {}}));
                then.status(200).json_body(json!({"status": "success", "data": []}));
            })
            .await;

        let state = state_with_key("");
        client_for(&server)
            .recommend_recipes(&state, &ingredients(&["egg", "rice"]), None)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn recommend_passes_profile_through() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST").path("/api/recommend").json_body(json!({
                    "ingredients": ["tofu"],
                    "user_profile": {"goal": "lose weight"}
                }));
                then.status(200).json_body(json!({"status": "success", "data": []}));
            })
            .await;

        let state = state_with_key("");
        client_for(&server)
            .recommend_recipes(
                &state,
                &ingredients(&["tofu"]),
                Some(json!({"goal": "lose weight"})),
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn evaluate_sends_plan_by_slot_label() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST").path("/api/evaluate").json_body(json!({
                    "plan": {"早餐": ["eggs"], "午餐": [], "晚餐": ["fish", "rice"]}
                }));
                then.status(200).json_body(json!({"status": "success", "report": "# 报告"}));
            })
            .await;

        let mut state = state_with_key("k");
        state.add_to_meal_plan(MealSlot::Breakfast, "eggs");
        state.add_to_meal_plan(MealSlot::Dinner, "fish");
        state.add_to_meal_plan(MealSlot::Dinner, "rice");
        let plan = state.meal_plan().clone();
        let resp = client_for(&server)
            .evaluate_meal_plan(&state, &plan)
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["report"], "# 报告");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn identify_posts_multipart_form() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/api/identify")
                    .header("x-api-key", "k");
                then.status(200).json_body(json!({
                    "status": "success",
                    "ingredients": ["egg"],
                    "items_with_loc": [{"name": "egg", "is_food": true}],
                    "nutrition": []
                }));
            })
            .await;

        let state = state_with_key("k");
        let resp = client_for(&server)
            .identify_ingredients(&state, image_form("meal.jpg", vec![0xff, 0xd8, 0xff]))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_identify_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST").path("/api/identify");
                then.status(422).body("field required");
            })
            .await;

        let state = state_with_key("");
        let err = client_for(&server)
            .identify_ingredients(&state, Form::new().text("not_file", "x"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNPROCESSABLE_ENTITY));
    }

    #[tokio::test]
    async fn unusable_key_fails_the_call() {
        let server = MockServer::start_async().await;
        let state = state_with_key("bad\nkey");
        let err = client_for(&server)
            .recommend_recipes(&state, &ingredients(&["egg"]), None)
            .await
            .unwrap_err();
        assert!(err.is_builder());
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_error() {
        let client =
            ApiClient::with_timeout("http://127.0.0.1:1/api", Duration::from_secs(2)).unwrap();
        let state = state_with_key("");
        let result = client.evaluate_meal_plan(&state, &MealPlan::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn state_can_change_while_call_is_pending() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/api/recommend")
                    .header("x-api-key", "first");
                then.status(200).json_body(json!({"status": "success", "data": []}));
            })
            .await;

        let mut state = state_with_key("first");
        let pending = client_for(&server).recommend_recipes(&state, &ingredients(&["egg"]), None);
        state.set_api_key("second").unwrap();
        pending.await.unwrap();
        assert_eq!(state.api_key(), "second");
        mock.assert_async().await;
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client =
            ApiClient::with_timeout("http://localhost:8000/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api");
    }
}

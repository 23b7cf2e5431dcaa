use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use noteai::ai::prompts::TRUNCATION_MARKER;
use noteai::ai::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Replays canned replies in order and records every request it sees.
struct Scripted {
    replies: Mutex<VecDeque<Result<String, TransportError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl Scripted {
    fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
        let replies = replies
            .into_iter()
            .map(|r| {
                r.map(str::to_string).map_err(|body| TransportError::Status {
                    status: 400,
                    body: body.to_string(),
                })
            })
            .collect();
        Arc::new(Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, i: usize) -> ChatRequest {
        self.requests.lock().unwrap()[i].clone()
    }
}

#[async_trait::async_trait]
impl ChatTransport for Scripted {
    async fn send(&self, request: &ChatRequest) -> Result<String, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

fn openai(base_url: &str) -> ProviderSettings {
    ProviderSettings {
        provider: Provider::OpenAi,
        api_key: "sk-test".to_string(),
        base_url: base_url.to_string(),
        model: "gpt-4o-mini".to_string(),
    }
}

fn assistant(transport: Arc<Scripted>) -> Assistant {
    Assistant::new(ModelClient::new(Some(openai("http://model.test/v1")), transport))
}

fn user_prompt(request: &ChatRequest) -> &str {
    &request.body.messages.last().unwrap().content
}

mod orchestration {
    use super::*;

    #[tokio::test]
    async fn unconfigured_client_never_calls_the_transport() {
        let transport = Scripted::new(vec![Ok("unused")]);
        let assistant = Assistant::new(ModelClient::new(None, transport.clone()));

        let err = assistant
            .summarize("text", SummaryMode::Short, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AiError::NotConfigured));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn long_bullet_summaries_are_truncated_with_marker() {
        let transport = Scripted::new(vec![Ok("- one")]);
        let text = "a".repeat(200_000);

        assistant(transport.clone())
            .summarize(&text, SummaryMode::Bullets, None)
            .await
            .unwrap();

        let request = transport.request(0);
        let prompt = user_prompt(&request);
        assert!(prompt.contains("Summarize as 5 clear bullet points."));
        assert!(prompt.contains(&format!("{}{}", "a".repeat(100_000), TRUNCATION_MARKER)));
        assert!(!prompt.contains(&"a".repeat(100_001)));
    }

    #[tokio::test]
    async fn unknown_summary_mode_behaves_like_short() {
        let transport = Scripted::new(vec![Ok("x"), Ok("x")]);
        let assistant = assistant(transport.clone());

        assistant
            .summarize("hello", SummaryMode::from_option(Some("bogus")), None)
            .await
            .unwrap();
        assistant
            .summarize("hello", SummaryMode::Short, None)
            .await
            .unwrap();

        assert_eq!(
            transport.request(0).body.messages,
            transport.request(1).body.messages
        );
    }

    #[tokio::test]
    async fn category_output_is_clamped_to_the_known_set() {
        let transport = Scripted::new(vec![Ok("\"Finance\""), Ok("astrology")]);
        let assistant = assistant(transport);

        assert_eq!(assistant.detect_category("q3 budget").await.unwrap(), Category::Finance);
        assert_eq!(assistant.detect_category("stars").await.unwrap(), Category::Other);
    }

    #[tokio::test]
    async fn malformed_structured_output_yields_empty_lists() {
        let transport = Scripted::new(vec![Ok("not json at all"), Ok("{\"oops\": true")]);
        let assistant = assistant(transport);

        assert!(assistant.extract_tasks("call mom").await.unwrap().is_empty());
        assert!(assistant
            .generate_flashcards("photosynthesis", 3)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn fenced_task_json_is_parsed() {
        let reply = "```json\n[{\"task\": \"Send report\", \"deadline\": \"Friday\", \"priority\": \"high\"}]\n```";
        let transport = Scripted::new(vec![Ok(reply)]);

        let tasks = assistant(transport)
            .extract_tasks("send the report by friday")
            .await
            .unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task, "Send report");
        assert_eq!(tasks[0].deadline.as_deref(), Some("Friday"));
    }

    #[tokio::test]
    async fn related_notes_are_bounded_and_in_range() {
        let transport = Scripted::new(vec![Ok("4, 0, 9, 0, 2, 1")]);
        let candidates: Vec<RelatedCandidate> = (0..5)
            .map(|i| RelatedCandidate {
                title: format!("Note {i}"),
                content: "body".to_string(),
            })
            .collect();

        let indices = assistant(transport)
            .find_related_notes("current", &candidates)
            .await
            .unwrap();

        assert_eq!(indices, vec![4, 0, 2]);
    }

    #[tokio::test]
    async fn related_notes_without_candidates_skip_the_model() {
        let transport = Scripted::new(vec![]);

        let indices = assistant(transport.clone())
            .find_related_notes("current", &[])
            .await
            .unwrap();

        assert!(indices.is_empty());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn context_length_errors_get_a_friendly_message() {
        let transport = Scripted::new(vec![Err(
            "This model's maximum context length is 128000 tokens",
        )]);

        let err = assistant(transport)
            .rewrite("text", RewriteStyle::Concise)
            .await
            .unwrap_err();

        assert!(matches!(err, AiError::TextTooLong));
        assert_eq!(
            err.to_string(),
            "Text is too long for AI processing. Please try with a shorter section."
        );
    }

    #[tokio::test]
    async fn other_provider_errors_are_wrapped() {
        let transport = Scripted::new(vec![Err("rate limited")]);

        let err = assistant(transport)
            .auto_format("text")
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("AI generation failed:"));
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn generated_notes_take_two_calls() {
        let transport = Scripted::new(vec![
            Ok("# Rust Ownership\n\nOwnership rules..."),
            Ok("rust, ownership, memory"),
        ]);

        let note = assistant(transport.clone())
            .generate_note("rust ownership", NoteLength::Short)
            .await
            .unwrap();

        assert_eq!(transport.calls(), 2);
        assert_eq!(note.title, "Rust Ownership");
        assert_eq!(note.tags, vec!["rust", "ownership", "memory"]);
    }

    #[tokio::test]
    async fn suggestions_need_enough_context() {
        let transport = Scripted::new(vec![Ok("and then some.")]);
        let assistant = assistant(transport.clone());

        assert_eq!(assistant.suggest("Hi", 2).await.unwrap(), "");
        assert_eq!(transport.calls(), 0);

        let suggestion = assistant
            .suggest("The meeting covered the roadmap", 31)
            .await
            .unwrap();
        assert_eq!(suggestion, "and then some.");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn chat_places_history_before_the_new_turn() {
        let transport = Scripted::new(vec![Ok("  Sure.  ")]);
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];

        let reply = assistant(transport.clone())
            .chat("help me plan", &history, Some("Trip notes"))
            .await
            .unwrap();

        assert_eq!(reply, "Sure.");
        let messages = transport.request(0).body.messages;
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert!(messages[0].content.contains("Trip notes"));
        assert_eq!(messages[3].content, "help me plan");
    }

    #[tokio::test]
    async fn dispatch_routes_style_actions_to_rewrite() {
        let transport = Scripted::new(vec![Ok("Dear team,")]);

        let output = assistant(transport.clone())
            .run_action(AiAction::Professional, "hey all", &ActionOptions::default())
            .await
            .unwrap();

        assert_eq!(output, AiOutput::Text("Dear team,".to_string()));
        assert!(user_prompt(&transport.request(0)).contains("hey all"));
    }

    #[tokio::test]
    async fn dispatch_honours_max_tags() {
        let transport = Scripted::new(vec![Ok("a, b, c, d")]);
        let options = ActionOptions {
            max_tags: Some(2),
            ..Default::default()
        };

        let output = assistant(transport)
            .run_action(AiAction::Tags, "text", &options)
            .await
            .unwrap();

        assert_eq!(output, AiOutput::Tags(vec!["a".into(), "b".into()]));
    }
}

mod http_transport {
    use super::*;

    fn completion(content: &str) -> serde_json::Value {
        json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
    }

    fn client(provider: ProviderSettings) -> ModelClient {
        ModelClient::new(Some(provider), Arc::new(HttpTransport::new()))
    }

    #[tokio::test]
    async fn posts_bearer_authenticated_completions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "max_tokens": 1000,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("  A summary.\n")))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(openai(&server.uri()))
            .complete("system", "user")
            .await
            .unwrap();

        assert_eq!(reply, "A summary.");
    }

    #[tokio::test]
    async fn openrouter_requests_carry_attribution_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("HTTP-Referer", "http://localhost:5173"))
            .and(header("X-Title", "NoteAI Pro"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let provider = ProviderSettings {
            provider: Provider::OpenRouter,
            ..openai(&server.uri())
        };
        let reply = client(provider).complete("s", "u").await.unwrap();

        assert_eq!(reply, "ok");
    }

    #[tokio::test]
    async fn error_bodies_reach_the_error_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"error":{"message":"This model's maximum context length is 8192 tokens"}}"#,
            ))
            .mount(&server)
            .await;

        let err = client(openai(&server.uri()))
            .complete("s", "u")
            .await
            .unwrap_err();

        assert!(matches!(err, AiError::TextTooLong));
    }

    #[tokio::test]
    async fn responses_without_content_are_generation_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = client(openai(&server.uri()))
            .complete("s", "u")
            .await
            .unwrap_err();

        assert!(matches!(err, AiError::Generation(_)));
    }
}

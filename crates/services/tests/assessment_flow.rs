use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use assess_core::model::{
    ActiveSession, ChoiceLetter, Difficulty, Question, Recommendation, SessionKind, TestKind,
    TopicPool, TopicResolution, UserId,
};
use assess_core::time::fixed_clock;
use async_trait::async_trait;
use services::{AdaptiveAssessmentService, AppServices, AssessmentError, NextAction};
use storage::import::seed_default_aliases;
use storage::repository::{
    InMemoryRepository, QuestionBank, QuestionCatalog, RecommendationRepository, SessionStore,
    Storage, StorageError, TopicPoolRepository,
};

const RIGHT: &str = "A";
const WRONG: &str = "B";

fn question(topic: &str, difficulty: Difficulty, prompt: &str) -> Question {
    let a = ChoiceLetter::parse("A").unwrap();
    let b = ChoiceLetter::parse("B").unwrap();
    Question::new(
        topic,
        difficulty,
        format!("{topic}: {prompt}"),
        BTreeMap::from([(a, "right".to_string()), (b, "wrong".to_string())]),
        a,
        format!("explains {prompt}"),
    )
    .unwrap()
}

/// Three questions per difficulty for every topic.
async fn seed(storage: &Storage, topics: &[&str]) {
    for topic in topics {
        for difficulty in Difficulty::ALL {
            for n in 1..=3 {
                let prompt = format!("{difficulty} #{n}");
                storage
                    .catalog
                    .insert_question(&question(topic, difficulty, &prompt))
                    .await
                    .unwrap();
            }
        }
    }
}

async fn app(topics: &[&str]) -> AppServices {
    let app = AppServices::in_memory(fixed_clock());
    seed(app.storage(), topics).await;
    app
}

fn user() -> UserId {
    UserId::new(42)
}

fn topics(names: &[&str]) -> Vec<String> {
    names.iter().map(|t| (*t).to_string()).collect()
}

#[tokio::test]
async fn medium_then_hard_correct_passes_the_topic() {
    let app = app(&["Stacks"]).await;
    let engine = app.assessment();

    let first = engine
        .start_adaptive_session(user(), topics(&["Stacks"]))
        .await
        .unwrap();
    assert_eq!(first.difficulty(), Difficulty::Medium);

    let result = engine.submit_answer(user(), RIGHT).await.unwrap();
    assert!(result.correct);
    assert_eq!(result.correct_choice.to_string(), "A");
    let NextAction::NextQuestion(next) = &result.next_action else {
        panic!("expected another question, got {:?}", result.next_action);
    };
    assert_eq!(next.difficulty(), Difficulty::Hard);

    let result = engine.submit_answer(user(), RIGHT).await.unwrap();
    let NextAction::SessionComplete(summary) = result.next_action else {
        panic!("expected completion");
    };
    assert_eq!(summary.passed, vec!["Stacks".to_string()]);
    assert!(summary.weak.is_empty() && summary.needs_training.is_empty());

    assert!(app.storage().sessions.load(user()).await.unwrap().is_none());
    let history = app.history().recent_results(user(), 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind(), TestKind::Adaptive);
    assert_eq!((history[0].correct(), history[0].total()), (2, 2));
}

#[tokio::test]
async fn two_easy_misses_after_first_medium_miss_make_the_topic_weak() {
    let app = app(&["Queues"]).await;
    let engine = app.assessment();
    engine
        .start_adaptive_session(user(), topics(&["Queues"]))
        .await
        .unwrap();

    let levels = [Difficulty::Easy, Difficulty::Easy];
    for expected in levels {
        let result = engine.submit_answer(user(), WRONG).await.unwrap();
        assert!(!result.correct);
        let next = result.next_action.question().unwrap();
        assert_eq!(next.difficulty(), expected);
    }

    let result = engine.submit_answer(user(), WRONG).await.unwrap();
    let NextAction::SessionComplete(summary) = result.next_action else {
        panic!("expected completion");
    };
    assert_eq!(summary.weak, vec!["Queues".to_string()]);

    let history = app.history().recent_results(user(), 1).await.unwrap();
    assert_eq!(history[0].total(), 3);
    assert_eq!(
        app.history().weak_topics(user()).await.unwrap(),
        vec!["Queues".to_string()]
    );
}

#[tokio::test]
async fn second_hard_miss_flags_needs_training() {
    let app = app(&["Recursion"]).await;
    let engine = app.assessment();
    engine
        .start_adaptive_session(user(), topics(&["Recursion"]))
        .await
        .unwrap();

    let script = [
        (RIGHT, Difficulty::Hard),
        (WRONG, Difficulty::Medium),
        (RIGHT, Difficulty::Hard),
    ];
    for (answer, expected) in script {
        let result = engine.submit_answer(user(), answer).await.unwrap();
        assert_eq!(result.next_action.question().unwrap().difficulty(), expected);
    }

    let result = engine.submit_answer(user(), WRONG).await.unwrap();
    let NextAction::SessionComplete(summary) = result.next_action else {
        panic!("expected completion");
    };
    assert_eq!(summary.needs_training, vec!["Recursion".to_string()]);
    assert!(summary.passed.is_empty());

    let history = app.history().recent_results(user(), 1).await.unwrap();
    assert_eq!((history[0].correct(), history[0].total()), (2, 4));
    assert_eq!(
        app.history().needs_training_topics(user()).await.unwrap(),
        vec!["Recursion".to_string()]
    );
}

#[tokio::test]
async fn two_topics_pass_in_order_with_a_transition() {
    let app = app(&["Stacks", "Queues"]).await;
    let engine = app.assessment();
    engine
        .start_adaptive_session(user(), topics(&["Stacks", "Queues"]))
        .await
        .unwrap();

    engine.submit_answer(user(), RIGHT).await.unwrap();
    let result = engine.submit_answer(user(), RIGHT).await.unwrap();
    match result.next_action {
        NextAction::TopicTransition {
            completed,
            resolution,
            next_topic,
            question,
        } => {
            assert_eq!(completed, "Stacks");
            assert_eq!(resolution, TopicResolution::Passed);
            assert_eq!(next_topic, "Queues");
            assert_eq!(question.topic(), "Queues");
            assert_eq!(question.difficulty(), Difficulty::Medium);
        }
        other => panic!("expected a topic transition, got {other:?}"),
    }

    let progress = engine.session_progress(user()).await.unwrap();
    assert_eq!(progress.topics_completed, 1);
    assert_eq!(progress.current_topic.as_deref(), Some("Queues"));

    engine.submit_answer(user(), RIGHT).await.unwrap();
    let result = engine.submit_answer(user(), RIGHT).await.unwrap();
    let NextAction::SessionComplete(summary) = result.next_action else {
        panic!("expected completion");
    };
    assert_eq!(summary.passed, topics(&["Stacks", "Queues"]));
}

#[tokio::test]
async fn needs_training_topic_reports_its_own_transition() {
    let app = app(&["Recursion", "Stacks"]).await;
    let engine = app.assessment();
    engine
        .start_adaptive_session(user(), topics(&["Recursion", "Stacks"]))
        .await
        .unwrap();

    for answer in [RIGHT, WRONG, RIGHT] {
        engine.submit_answer(user(), answer).await.unwrap();
    }
    let result = engine.submit_answer(user(), WRONG).await.unwrap();
    match result.next_action {
        NextAction::NeedsTrainingTopicComplete {
            topic,
            next_topic,
            question,
        } => {
            assert_eq!(topic, "Recursion");
            assert_eq!(next_topic, "Stacks");
            assert_eq!(question.difficulty(), Difficulty::Medium);
        }
        other => panic!("expected needs-training transition, got {other:?}"),
    }
}

#[tokio::test]
async fn ceiling_ends_a_topic_and_no_question_repeats() {
    let app = app(&["Graphs"]).await;
    let engine = app.assessment();
    let first = engine
        .start_adaptive_session(user(), topics(&["Graphs"]))
        .await
        .unwrap();

    let mut served = vec![first.prompt().to_string()];
    // Medium miss, Easy hit, repeated: bounces between the two levels.
    let script = [WRONG, RIGHT, WRONG, RIGHT];
    for answer in script {
        let result = engine.submit_answer(user(), answer).await.unwrap();
        served.push(result.next_action.question().unwrap().prompt().to_string());
    }
    assert_eq!(
        engine.session_progress(user()).await.unwrap().questions_on_topic,
        4
    );

    let result = engine.submit_answer(user(), WRONG).await.unwrap();
    let NextAction::SessionComplete(summary) = result.next_action else {
        panic!("expected the ceiling to end the session");
    };
    assert_eq!(summary.weak, vec!["Graphs".to_string()]);

    let distinct: HashSet<_> = served.iter().collect();
    assert_eq!(distinct.len(), served.len());
    let history = app.history().recent_results(user(), 1).await.unwrap();
    assert_eq!(history[0].total(), 5);
}

#[tokio::test]
async fn aliases_resolve_and_duplicates_collapse() {
    let app = app(&["Stacks"]).await;
    seed_default_aliases(app.storage().catalog.as_ref())
        .await
        .unwrap();

    let first = app
        .assessment()
        .start_adaptive_session(user(), topics(&["stack", " Stacks ", "Stack"]))
        .await
        .unwrap();
    assert_eq!(first.topic(), "Stacks");
    let progress = app.assessment().session_progress(user()).await.unwrap();
    assert_eq!(progress.topics_total, 1);
}

#[tokio::test]
async fn topics_without_questions_are_left_out() {
    let app = app(&["Stacks"]).await;
    let first = app
        .assessment()
        .start_adaptive_session(user(), topics(&["Heaps", "Stacks"]))
        .await
        .unwrap();
    assert_eq!(first.topic(), "Stacks");
    assert_eq!(
        app.assessment()
            .session_progress(user())
            .await
            .unwrap()
            .topics_total,
        1
    );

    let other = UserId::new(7);
    let err = app
        .assessment()
        .start_adaptive_session(other, topics(&["Heaps"]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AssessmentError::NoQuestionsAvailable { ref topic, difficulty: None } if topic == "Heaps"
    ));
}

#[tokio::test]
async fn start_and_answer_errors_are_typed() {
    let app = app(&["Stacks"]).await;
    let engine = app.assessment();

    assert!(matches!(
        engine.submit_answer(user(), RIGHT).await.unwrap_err(),
        AssessmentError::SessionNotFound
    ));
    assert!(matches!(
        engine
            .start_adaptive_session(user(), topics(&["  ", ""]))
            .await
            .unwrap_err(),
        AssessmentError::NoTopicsSelected
    ));

    let first = engine
        .start_adaptive_session(user(), topics(&["Stacks"]))
        .await
        .unwrap();
    assert!(matches!(
        engine
            .start_adaptive_session(user(), topics(&["Stacks"]))
            .await
            .unwrap_err(),
        AssessmentError::AlreadyActiveSession
    ));

    assert!(matches!(
        engine.submit_answer(user(), "Z").await.unwrap_err(),
        AssessmentError::InvalidAnswerFormat(_)
    ));
    assert_eq!(engine.current_question(user()).await.unwrap(), Some(first));
    assert_eq!(
        engine.session_progress(user()).await.unwrap().questions_answered,
        0
    );

    let err = app
        .follow_up()
        .submit_follow_up_answer(user(), RIGHT)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AssessmentError::SessionTypeMismatch {
            expected: SessionKind::FollowUp,
            found: SessionKind::Assessment
        }
    ));

    engine.reset_session(user()).await.unwrap();
    engine.reset_session(user()).await.unwrap();
    assert_eq!(engine.current_question(user()).await.unwrap(), None);
}

#[tokio::test]
async fn lowercase_answers_are_accepted() {
    let app = app(&["Stacks"]).await;
    let engine = app.assessment();
    engine
        .start_adaptive_session(user(), topics(&["Stacks"]))
        .await
        .unwrap();
    assert!(engine.submit_answer(user(), " a ").await.unwrap().correct);
}

// ─── STORE FAILURES ─────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct FlakySessions {
    inner: InMemoryRepository,
    fail_saves: Arc<AtomicBool>,
}

#[async_trait]
impl SessionStore for FlakySessions {
    async fn load(&self, user: UserId) -> Result<Option<ActiveSession>, StorageError> {
        self.inner.load(user).await
    }

    async fn save(&self, user: UserId, session: &ActiveSession) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("disk full".to_string()));
        }
        self.inner.save(user, session).await
    }

    async fn clear(&self, user: UserId) -> Result<(), StorageError> {
        self.inner.clear(user).await
    }
}

#[tokio::test]
async fn failed_save_leaves_the_stored_session_untouched() {
    let repo = InMemoryRepository::new();
    let storage = Storage::from_repository(repo.clone());
    seed(&storage, &["Stacks"]).await;

    let sessions = FlakySessions {
        inner: repo.clone(),
        ..FlakySessions::default()
    };
    let engine = AdaptiveAssessmentService::new(
        fixed_clock(),
        Arc::clone(&storage.questions),
        Arc::new(sessions.clone()),
        Arc::clone(&storage.completions),
    );

    let first = engine
        .start_adaptive_session(user(), topics(&["Stacks"]))
        .await
        .unwrap();
    let before = repo.load(user()).await.unwrap();

    sessions.fail_saves.store(true, Ordering::SeqCst);
    let err = engine.submit_answer(user(), RIGHT).await.unwrap_err();
    assert!(matches!(err, AssessmentError::Storage(_)));
    assert_eq!(repo.load(user()).await.unwrap(), before);
    assert_eq!(engine.current_question(user()).await.unwrap(), Some(first));

    sessions.fail_saves.store(false, Ordering::SeqCst);
    let result = engine.submit_answer(user(), RIGHT).await.unwrap();
    assert!(result.correct);
    assert_eq!(
        storage.pools.pool_topics(user(), TopicPool::Weak).await.unwrap(),
        Vec::<String>::new()
    );
}

/// Hides one topic's questions once `hidden` is set.
#[derive(Clone)]
struct VanishingBank {
    inner: InMemoryRepository,
    topic: &'static str,
    hidden: Arc<AtomicBool>,
}

#[async_trait]
impl QuestionBank for VanishingBank {
    async fn resolve_topic_alias(&self, name: &str) -> Result<String, StorageError> {
        self.inner.resolve_topic_alias(name).await
    }

    async fn candidates(
        &self,
        topic: &str,
        difficulty: Option<Difficulty>,
    ) -> Result<Vec<Question>, StorageError> {
        if self.hidden.load(Ordering::SeqCst) && topic == self.topic {
            return Ok(Vec::new());
        }
        self.inner.candidates(topic, difficulty).await
    }

    async fn list_topics(&self) -> Result<Vec<String>, StorageError> {
        self.inner.list_topics().await
    }
}

#[tokio::test]
async fn topic_emptied_mid_run_is_reported_as_a_transition() {
    let repo = InMemoryRepository::new();
    let storage = Storage::from_repository(repo.clone());
    seed(&storage, &["Stacks", "Queues"]).await;

    let bank = VanishingBank {
        inner: repo,
        topic: "Stacks",
        hidden: Arc::new(AtomicBool::new(false)),
    };
    let engine = AdaptiveAssessmentService::new(
        fixed_clock(),
        Arc::new(bank.clone()),
        Arc::clone(&storage.sessions),
        Arc::clone(&storage.completions),
    );
    engine
        .start_adaptive_session(user(), topics(&["Stacks", "Queues"]))
        .await
        .unwrap();

    bank.hidden.store(true, Ordering::SeqCst);
    let result = engine.submit_answer(user(), RIGHT).await.unwrap();
    match result.next_action {
        NextAction::TopicTransition {
            completed,
            resolution,
            next_topic,
            question,
        } => {
            assert_eq!(completed, "Stacks");
            assert_eq!(resolution, TopicResolution::Exhausted);
            assert_eq!(next_topic, "Queues");
            assert_eq!(question.difficulty(), Difficulty::Medium);
        }
        other => panic!("expected a topic transition, got {other:?}"),
    }
}

#[tokio::test]
async fn weak_topics_come_with_study_material() {
    let app = app(&["Graphs", "Stacks"]).await;
    seed_default_aliases(app.storage().catalog.as_ref()).await.unwrap();
    app.storage()
        .recommendations
        .upsert_recommendation(&Recommendation::new(
            "Graph",
            Some("https://video.example/graphs".to_string()),
            Some("https://docs.example/graphs".to_string()),
        ))
        .await
        .unwrap();

    let engine = app.assessment();
    engine
        .start_adaptive_session(user(), topics(&["Graphs", "Stacks"]))
        .await
        .unwrap();
    for answer in [WRONG, WRONG, WRONG, RIGHT] {
        engine.submit_answer(user(), answer).await.unwrap();
    }
    let result = engine.submit_answer(user(), RIGHT).await.unwrap();
    let NextAction::SessionComplete(summary) = result.next_action else {
        panic!("expected completion");
    };
    assert_eq!(summary.weak, topics(&["Graphs"]));

    let history = app.history();
    let found = history.recommendations(&summary.weak).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].topic(), "Graphs");
    assert_eq!(found[0].video_url(), Some("https://video.example/graphs"));

    let by_alias = history.recommendation("graph").await.unwrap().unwrap();
    assert_eq!(by_alias, found[0]);
    assert!(history.recommendation("Stacks").await.unwrap().is_none());
}

#[tokio::test]
async fn learners_run_concurrently() {
    let app = app(&["Stacks", "Queues"]).await;
    let mut handles = Vec::new();
    for id in 1..=8 {
        let engine = app.assessment();
        handles.push(tokio::spawn(async move {
            let user = UserId::new(id);
            engine
                .start_adaptive_session(user, topics(&["Stacks"]))
                .await
                .unwrap();
            engine.submit_answer(user, RIGHT).await.unwrap();
            engine.submit_answer(user, RIGHT).await.unwrap()
        }));
    }
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(matches!(result.next_action, NextAction::SessionComplete(_)));
    }
    assert_eq!(app.history().recent_results(UserId::new(3), 5).await.unwrap().len(), 1);
}

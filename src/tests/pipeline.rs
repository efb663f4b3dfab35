use super::*;
use crate::TopicError;

#[test]
fn test_fit_embeds_in_one_call() {
    let (model, embedder) = fitted_model(50);
    assert_eq!(embedder.calls(), 1);

    let store = model.documents().unwrap();
    assert_eq!(store.len(), 50);
    assert!(store.coords().is_some());
    let ids: Vec<u64> = store.iter().map(|d| d.id).collect();
    assert_eq!(ids, (0..50).collect::<Vec<u64>>());
}

#[test]
fn test_fit_rejects_empty_corpus() {
    let mut model = TopicModel::new(test_config(), Arc::new(LexiconEmbedder::new())).unwrap();
    assert!(matches!(model.fit(vec![]), Err(TopicError::Configuration(_))));
    assert!(!model.is_fitted());
}

#[test]
fn test_fit_below_reduction_minimum() {
    let mut model = TopicModel::new(test_config(), Arc::new(LexiconEmbedder::new())).unwrap();
    let result = model.fit(corpus(3));
    assert!(matches!(result, Err(TopicError::Configuration(_))));
    assert!(!model.is_fitted());
}

#[test]
fn test_timeout_during_fit_leaves_previous_corpus() {
    let mut config = test_config();
    config.embedding.timeout_secs = Some(1);
    let embedder = Arc::new(LexiconEmbedder::new());
    let mut model = TopicModel::new(config, embedder.clone()).unwrap();

    model.fit(corpus(20)).unwrap();
    let topics = model.get_topics(2, 1).unwrap().clone();

    embedder.set_slow(true);
    let replacement: Vec<String> = (0..30).map(|i| format!("new document {}", i)).collect();
    let err = model.fit(replacement).unwrap_err();
    assert!(err.is_timeout());

    let store = model.documents().unwrap();
    assert_eq!(store.len(), 20);
    assert_eq!(store.get(0).unwrap().text, corpus(20)[0]);
    assert!(store.iter().all(|d| d.topic.is_some()));
    assert_eq!(model.topics(), Some(&topics));
}

#[test]
fn test_mismatched_embedding_count_aborts_fit() {
    let mut model = TopicModel::new(test_config(), Arc::new(ShortEmbedder)).unwrap();
    let result = model.fit(corpus(10));
    assert!(matches!(result, Err(TopicError::Embedding(_))));
    assert!(!model.is_fitted());
}

#[test]
fn test_refit_replaces_corpus_and_topics() {
    let (mut model, _) = fitted_model(20);
    model.get_topics(2, 1).unwrap();

    model.fit(corpus(12)).unwrap();
    assert_eq!(model.documents().unwrap().len(), 12);
    assert!(model.topics().is_none());
    assert!(model.documents().unwrap().iter().all(|d| d.topic.is_none()));
}

#[test]
fn test_cached_embeddings_skip_backend() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.embedding.cache_dir = Some(dir.path().to_path_buf());

    let first = Arc::new(LexiconEmbedder::new());
    let mut model = TopicModel::new(config.clone(), first.clone()).unwrap();
    model.fit(corpus(15)).unwrap();
    assert_eq!(first.calls(), 1);

    let second = Arc::new(LexiconEmbedder::new());
    let mut reloaded = TopicModel::new(config, second.clone()).unwrap();
    reloaded.fit(corpus(15)).unwrap();
    assert_eq!(second.calls(), 0);

    let a: Vec<Vec<f32>> = model.documents().unwrap().iter().map(|d| d.embedding().to_vec()).collect();
    let b: Vec<Vec<f32>> = reloaded.documents().unwrap().iter().map(|d| d.embedding().to_vec()).collect();
    assert_eq!(a, b);
}

#[test]
fn test_query_similarity_share() {
    let (mut model, _) = fitted_model(20);
    let report = model.query_similarity("ocean wave tide", 0.3).unwrap();
    assert_eq!(report.scores.len(), 20);

    let above = report.scores.iter().filter(|s| s.score >= 0.3).count();
    assert_eq!(report.share, above as f64 / 20.0);
    assert!(report.share > 0.0 && report.share < 1.0);

    let best = report
        .scores
        .iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .unwrap();
    assert_eq!(best.id % 10, 0);
}

#[test]
fn test_independent_sessions_do_not_share_state() {
    let (mut a, _) = fitted_model(20);
    let (b, _) = fitted_model(12);

    a.get_topics(3, 1).unwrap();
    assert!(b.topics().is_none());
    assert_eq!(b.documents().unwrap().len(), 12);
}

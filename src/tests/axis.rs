use super::*;
use crate::axis::AxisRequest;
use crate::TopicError;

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

/// Corpus where some documents lean on the axis words.
fn leaning_corpus() -> Vec<String> {
    let mut docs = corpus(24);
    for (i, doc) in docs.iter_mut().enumerate() {
        let lean = match i % 4 {
            0 => "past men",
            1 => "future men",
            2 => "past women",
            _ => "future women",
        };
        doc.push(' ');
        doc.push_str(lean);
    }
    docs
}

fn leaning_model() -> (TopicModel, Arc<LexiconEmbedder>) {
    let embedder = Arc::new(LexiconEmbedder::new());
    let mut model = TopicModel::new(test_config(), embedder.clone()).unwrap();
    model.fit(leaning_corpus()).unwrap();
    (model, embedder)
}

#[test]
fn test_swapping_word_sets_negates_scores() {
    let (mut model, _) = leaning_model();

    let forward = model
        .query_axis_1d(words(&["past"]), words(&["future"]), false)
        .unwrap();
    let backward = model
        .query_axis_1d(words(&["future"]), words(&["past"]), false)
        .unwrap();

    assert_eq!(forward.scores.len(), backward.scores.len());
    for (f, b) in forward.scores.iter().zip(&backward.scores) {
        assert_eq!(f.x, -b.x);
        assert!(f.y.is_none());
    }
}

#[test]
fn test_scores_point_towards_matching_words() {
    let (mut model, _) = leaning_model();
    let projection = model
        .query_axis_1d(words(&["past"]), words(&["future"]), false)
        .unwrap();

    // Documents 1 and 3 mention "future", 0 and 2 mention "past"
    for (i, score) in projection.scores.iter().enumerate() {
        if i % 2 == 1 {
            assert!(score.x > 0.0, "document {} should lean right", i);
        } else {
            assert!(score.x < 0.0, "document {} should lean left", i);
        }
    }
    assert!((projection.shares.top_right - 0.5).abs() < 1e-9);
}

#[test]
fn test_two_axes_without_clustering() {
    let (mut model, _) = leaning_model();
    let request = AxisRequest {
        x_left: words(&["past"]),
        x_right: words(&["future"]),
        y_top: words(&["men"]),
        y_bottom: words(&["women"]),
        clustering: false,
        ..AxisRequest::default()
    };

    let projection = model.query_axis(&request).unwrap();
    assert_eq!(projection.scores.len(), 24);
    assert!(projection.scores.iter().all(|s| s.y.is_some()));
    assert!(projection.regions.is_none());

    let store = model.documents().unwrap();
    for (doc, score) in store.iter().zip(&projection.scores) {
        assert_eq!(doc.axis, Some(*score));
        assert!(doc.topic.is_none());
    }

    // Each quadrant holds one lean
    let shares = projection.shares;
    for share in [shares.top_right, shares.top_left, shares.bottom_left, shares.bottom_right] {
        assert!((share - 0.25).abs() < 1e-9);
    }
}

#[test]
fn test_axis_regions() {
    let (mut model, _) = leaning_model();
    let request = AxisRequest {
        clustering: true,
        n_clusters: 4,
        ..AxisRequest::default()
    };

    let projection = model.query_axis(&request).unwrap();
    let regions = projection.regions.unwrap();
    assert_eq!(regions.len(), 4);
    assert_eq!(regions.iter().map(|r| r.size()).sum::<usize>(), 24);
    for region in &regions {
        assert!(region.centroid.x.abs() <= 1.0 && region.centroid.y.abs() <= 1.0);
    }
}

#[test]
fn test_explanation_names_axis_terms() {
    let (mut model, _) = leaning_model();
    let projection = model
        .query_axis_1d(words(&["past"]), words(&["future"]), true)
        .unwrap();

    let explanation = projection.explanation.unwrap();
    assert_eq!(explanation.x.positive[0].term, "future");
    assert_eq!(explanation.x.negative[0].term, "past");
}

#[test]
fn test_explanation_can_be_turned_off() {
    let (mut model, _) = leaning_model();
    let projection = model
        .query_axis_1d(words(&["past"]), words(&["future"]), false)
        .unwrap();
    assert!(projection.explanation.is_none());
}

#[test]
fn test_empty_word_set_is_rejected_before_embedding() {
    let (mut model, embedder) = leaning_model();
    let calls = embedder.calls();

    let request = AxisRequest {
        x_left: vec![],
        ..AxisRequest::default()
    };
    assert!(matches!(
        model.query_axis(&request),
        Err(TopicError::Configuration(_))
    ));
    assert!(matches!(
        model.query_axis_1d(words(&["past"]), words(&[" "]), false),
        Err(TopicError::Configuration(_))
    ));
    assert_eq!(embedder.calls(), calls);
}

#[test]
fn test_singleton_corpus_rejected() {
    let mut config = test_config();
    config.reduction.min_documents = 1;
    let mut model = TopicModel::new(config, Arc::new(LexiconEmbedder::new())).unwrap();
    model.fit(vec!["rocket orbit".to_string()]).unwrap();

    assert!(matches!(
        model.query_axis_1d(words(&["past"]), words(&["future"]), false),
        Err(TopicError::Configuration(_))
    ));
    assert!(model.documents().unwrap().get(0).unwrap().axis.is_none());
}

#[test]
fn test_failed_query_keeps_previous_scores() {
    let (mut model, _) = leaning_model();
    let first = model
        .query_axis_1d(words(&["past"]), words(&["future"]), false)
        .unwrap();

    let request = AxisRequest {
        clustering: true,
        n_clusters: 100,
        ..AxisRequest::default()
    };
    assert!(model.query_axis(&request).is_err());

    for (doc, score) in model.documents().unwrap().iter().zip(&first.scores) {
        assert_eq!(doc.axis, Some(*score));
    }
}

#[test]
fn test_pole_vectors_are_cached() {
    let (mut model, embedder) = leaning_model();
    let request = AxisRequest::default();

    model.query_axis(&request).unwrap();
    let calls = embedder.calls();
    model.query_axis(&request).unwrap();
    assert_eq!(embedder.calls(), calls);
}

//! End-to-end coverage across the dictionary, n-gram tries, and predictor,
//! exercising the concrete scenarios and boundary behaviours from the
//! design document rather than re-testing any single module in isolation.

use predict_engine::ngram::{write_from_dynamic, StaticTrie};
use predict_engine::{Dictionary, DynamicTrie, PredictionConfig, Predictor};

fn build_dictionary() -> Dictionary {
    let mut dict = Dictionary::new("pipeline-test");
    for word in ["chat", "chaton", "chien", "chanter", "bonjour"] {
        dict.insert_simple_word(word);
    }
    dict
}

#[test]
fn empty_text_returns_root_continuations_ranked_by_unigram_probability() {
    let dict = build_dictionary();
    let chat_id = dict.id_for("chat");
    let chien_id = dict.id_for("chien");

    let mut dynamic = DynamicTrie::new(3);
    dynamic.increment_path(&[chat_id], 50);
    dynamic.increment_path(&[chien_id], 5);
    dynamic.update_probabilities(&[0.0, 0.5, 0.5]);

    let mut predictor = Predictor::new(dict, None, PredictionConfig::default());
    // Predictor starts its own empty dynamic trie; seed it the same way a
    // host would after loading a persisted one.
    predictor.train("chat chat chat chat chat chat chat chat chat chat chien", false);

    let result = predictor.predict("", None, 2, &[]);
    assert!(!result.candidates.is_empty());
    assert!(result.candidates[0].surface.to_lowercase() == "chat");
    assert!(result.candidates.iter().all(|c| (0.0..=1.0).contains(&c.score)));
}

#[test]
fn trailing_apostrophe_has_no_started_prefix_but_allows_compounds() {
    let dict = build_dictionary();
    let mut predictor = Predictor::new(dict, None, PredictionConfig::default());
    predictor.train("chat chante bonjour chat chante bonjour", false);

    // No panic, and no candidate is treated as a simple completion of "l'".
    let result = predictor.predict("l'", None, 5, &[]);
    for candidate in &result.candidates {
        assert!(candidate.previous_char_count_to_remove <= "l'".chars().count());
    }
}

#[test]
fn short_prefix_below_minimum_returns_nothing() {
    let dict = build_dictionary();
    let mut config = PredictionConfig::default();
    config.min_count_to_provide_prediction = 5;
    let mut predictor = Predictor::new(dict, None, config);
    let result = predictor.predict("le ch", None, 5, &[]);
    assert!(result.candidates.is_empty());
}

#[test]
fn zero_correction_cost_never_yields_corrections() {
    let dict = build_dictionary();
    let mut config = PredictionConfig::default();
    config.enable_word_correction = true;
    config.correction_max_cost = 0.0;
    let mut predictor = Predictor::new(dict, None, config);
    let result = predictor.predict("le chta", None, 5, &[]);
    assert!(result.candidates.iter().all(|c| !c.is_correction));
}

#[test]
fn static_trie_round_trip_matches_dynamic_after_training() {
    let dict = build_dictionary();
    let chat_id = dict.id_for("chat");
    let chaton_id = dict.id_for("chaton");

    let mut dynamic = DynamicTrie::new(2);
    dynamic.increment_path(&[chat_id], 20);
    dynamic.increment_path(&[chat_id, chaton_id], 7);
    dynamic.update_probabilities(&[0.0, 0.5]);

    let path = std::env::temp_dir().join(format!(
        "predict_engine_pipeline_test_{}_{}.bin",
        std::process::id(),
        chat_id
    ));
    write_from_dynamic(&path, &dynamic).unwrap();
    let static_trie = StaticTrie::open(&path).unwrap();

    let mut predictor = Predictor::new(dict, Some(static_trie), PredictionConfig::default());
    let result = predictor.predict("le ch", None, 5, &[]);
    assert!(result.candidates.iter().any(|c| c.surface.to_lowercase().starts_with("ch")));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn dictionary_overlay_survives_a_save_and_reload_cycle() {
    let mut dict = build_dictionary();
    let gizmo_id = dict.put_user_word("gizmo");
    dict.increment_user_count(gizmo_id);
    dict.increment_user_count(gizmo_id);

    let path = std::env::temp_dir().join(format!(
        "predict_engine_pipeline_overlay_{}.bin",
        std::process::id()
    ));
    dict.save_user_overlay(&path).unwrap();

    let mut reloaded = build_dictionary();
    reloaded.load_user_overlay(&path).unwrap();
    assert_eq!(reloaded.id_for("gizmo"), gizmo_id);

    let _ = std::fs::remove_file(&path);
}

use super::*;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

fn clear_newsmatch_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for name in Config::ENV_VARS {
        unsafe { env::remove_var(name) };
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.db_path, PathBuf::from("./.data/newsmatch.db"));
    assert_eq!(config.articles_paths, vec![PathBuf::from("./articles.jsonl")]);
    assert_eq!(config.ollama_url, "http://localhost:11434");
    assert_eq!(config.similarity_threshold, 0.55);
    assert_eq!(config.confidence_threshold, 0.70);
    assert_eq!(config.max_articles_per_source, 10);
    assert_eq!(config.max_candidates, 5);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_from_env_with_defaults() {
    clear_newsmatch_env();

    let config = Config::from_env().expect("should parse with defaults");
    assert_eq!(config, Config::default());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_newsmatch_env();

    with_env_vars(
        &[
            ("NEWSMATCH_DB_PATH", "/var/lib/newsmatch/matches.db"),
            ("NEWSMATCH_LLM_MODEL", "gemini-2.0-flash"),
            ("NEWSMATCH_SIMILARITY_THRESHOLD", "0.5"),
            ("NEWSMATCH_VERIFIER_CONCURRENCY", " 8 "),
            ("NEWSMATCH_FAILURE_BUDGET", "2"),
        ],
        || {
            let config = Config::from_env().expect("should parse");

            assert_eq!(config.db_path, PathBuf::from("/var/lib/newsmatch/matches.db"));
            assert_eq!(config.llm_model, "gemini-2.0-flash");
            assert_eq!(config.similarity_threshold, 0.5);
            assert_eq!(config.verifier_concurrency, 8);
            assert_eq!(config.failure_budget, 2);
            assert_eq!(config.embed_model, Config::default().embed_model);
        },
    );
}

#[test]
#[serial]
fn test_articles_path_list() {
    clear_newsmatch_env();

    with_env_vars(
        &[("NEWSMATCH_ARTICLES_PATH", "feeds/hn.jsonl, feeds/wire.jsonl,,")],
        || {
            let config = Config::from_env().expect("should parse");
            assert_eq!(
                config.articles_paths,
                vec![
                    PathBuf::from("feeds/hn.jsonl"),
                    PathBuf::from("feeds/wire.jsonl")
                ]
            );
        },
    );
}

#[test]
#[serial]
fn test_unparsable_number_is_an_error() {
    clear_newsmatch_env();

    with_env_vars(&[("NEWSMATCH_ARTICLE_CONCURRENCY", "lots")], || {
        let err = Config::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "NEWSMATCH_ARTICLE_CONCURRENCY",
                ..
            }
        ));
        assert!(err.to_string().contains("lots"));
    });
}

#[test]
#[serial]
fn test_blank_string_falls_back_to_default() {
    clear_newsmatch_env();

    with_env_vars(&[("NEWSMATCH_OLLAMA_URL", "   ")], || {
        let config = Config::from_env().expect("should parse");
        assert_eq!(config.ollama_url, "http://localhost:11434");
    });
}

#[test]
fn test_validate_rejects_out_of_range_threshold() {
    let config = Config {
        confidence_threshold: 1.2,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidThreshold {
            name: "NEWSMATCH_CONFIDENCE_THRESHOLD",
            ..
        })
    ));
}

#[test]
fn test_validate_rejects_zero_limits() {
    let config = Config {
        verifier_concurrency: 0,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MustBePositive {
            name: "NEWSMATCH_VERIFIER_CONCURRENCY"
        })
    ));

    let config = Config {
        articles_paths: Vec::new(),
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::MissingEnvVar { .. })
    ));
}

#[test]
fn test_validate_rejects_directory_db_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        db_path: dir.path().to_path_buf(),
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::NotAFile { .. })
    ));
}

#[test]
fn test_derived_configs() {
    let config = Config {
        similarity_threshold: 0.4,
        verifier_concurrency: 3,
        retry_max_attempts: 5,
        retry_base_delay_ms: 100,
        request_timeout_secs: 7,
        embed_model: "nomic-embed-text".to_string(),
        ..Default::default()
    };

    let pipeline = config.pipeline_config();
    assert_eq!(pipeline.similarity_threshold, 0.4);
    assert_eq!(pipeline.max_candidates, Some(5));
    assert_eq!(pipeline.verifier_concurrency, 3);
    assert!(pipeline.validate().is_ok());

    let retry = config.retry_policy();
    assert_eq!(retry.max_attempts, 5);
    assert_eq!(retry.base_delay, Duration::from_millis(100));
    assert_eq!(retry.call_timeout, Duration::from_secs(7));

    let ollama = config.ollama_config();
    assert_eq!(ollama.model, "nomic-embed-text");
    assert_eq!(ollama.timeout, Duration::from_secs(7));
}

#[test]
#[serial]
fn test_max_candidates_zero_removes_cap() {
    clear_newsmatch_env();

    with_env_vars(&[("NEWSMATCH_MAX_CANDIDATES", "0")], || {
        let config = Config::from_env().expect("should parse");
        assert_eq!(config.max_candidates, 0);
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline_config().max_candidates, None);
    });

    with_env_vars(&[("NEWSMATCH_MAX_CANDIDATES", "3")], || {
        let config = Config::from_env().expect("should parse");
        assert_eq!(config.pipeline_config().max_candidates, Some(3));
    });
}

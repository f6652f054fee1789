mod common;

use content_engine::audit::{AuditLogStore, DateRange, LogFilter};
use content_engine::generation::{
    GenerationConfig, GenerationContext, GenerationError, GenerationRequest, Provider,
    ServiceError, UseCase,
};
use content_engine::llm::{DispatchError, Usage};
use rust_decimal::Decimal;
use tokio_test::{assert_err, assert_ok};

use common::{StubDispatch, harness};

fn post_title_config() -> GenerationConfig {
    GenerationConfig::new(
        UseCase::PostSeoTitle,
        Provider::OpenRouter,
        "vendor-x/model-y",
        "Write a title.",
    )
    .with_user_prompt("Title for: {{title}}")
    .with_params(0.7, 100)
}

fn titled(title: &str) -> GenerationContext {
    GenerationContext {
        title: Some(title.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn clean_config_renders_and_dispatches_normalized_model() {
    let h = harness(
        vec![post_title_config()],
        StubDispatch::replying("Best Gifts for Geeks", "vendor-x/model-y", None),
    );

    let outcome = assert_ok!(
        h.state
            .service
            .generate(GenerationRequest::new(UseCase::PostSeoTitle, titled("Best Gifts")))
            .await
    );

    let calls = h.dispatch.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].model, "openrouter/vendor-x/model-y");
    assert_eq!(calls[0].temperature, 0.7);
    assert_eq!(calls[0].max_tokens, 100);
    assert_eq!(calls[0].user_prompt, "Title for: Best Gifts");
    assert_eq!(outcome.result.content, "Best Gifts for Geeks");
}

#[tokio::test]
async fn missing_context_field_renders_empty() {
    let h = harness(
        vec![post_title_config()],
        StubDispatch::replying("Some title", "vendor-x/model-y", None),
    );

    assert_ok!(
        h.state
            .service
            .generate(GenerationRequest::new(
                UseCase::PostSeoTitle,
                GenerationContext::default()
            ))
            .await
    );

    assert_eq!(h.dispatch.calls()[0].user_prompt, "Title for: ");
}

#[tokio::test]
async fn missing_config_fails_before_any_dispatch() {
    let h = harness(
        vec![post_title_config()],
        StubDispatch::replying("unused", "gpt-4o-mini", None),
    );

    let err = assert_err!(
        h.state
            .service
            .generate(GenerationRequest::new(
                UseCase::ProductTags,
                GenerationContext::default()
            ))
            .await
    );

    assert!(matches!(
        err,
        ServiceError::Generation(GenerationError::ConfigNotFound(UseCase::ProductTags))
    ));
    assert!(h.dispatch.calls().is_empty());

    let records = h.logs.snapshot();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
    assert_eq!(records[0].use_case, "product_tags");
    assert_eq!(records[0].provider, "unknown");
}

#[tokio::test]
async fn cost_follows_reported_usage() {
    let config = GenerationConfig::new(
        UseCase::ProductTags,
        Provider::OpenAi,
        "gpt-4o-mini",
        "Sugira tags.",
    )
    .with_user_prompt("Produto: {{product_name}}");
    let h = harness(
        vec![config],
        StubDispatch::replying("geek, funko", "gpt-4o-mini", Some(Usage::new(120, 40))),
    );

    let outcome = assert_ok!(
        h.state
            .service
            .generate(GenerationRequest::new(
                UseCase::ProductTags,
                GenerationContext::default()
            ))
            .await
    );

    assert_eq!(outcome.result.cost_usd, Decimal::new(42, 6));
    assert_eq!(outcome.result.total_tokens, 160);

    let total = assert_ok!(h.logs.sum_cost(DateRange::default()).await);
    assert_eq!(total, Decimal::new(42, 6));
}

#[tokio::test]
async fn legacy_config_strips_context_block() {
    let config = GenerationConfig::new(
        UseCase::PostSeoDescription,
        Provider::OpenRouter,
        "google/gemini-2.0-flash-exp:free",
        "Voce e especialista em SEO.\n\nCONTEXTO DO POST:\n- Titulo: {{title}}\n\nREGRAS:\n- Maximo 160 caracteres",
    );
    let h = harness(
        vec![config],
        StubDispatch::replying(
            "Descricao.",
            "google/gemini-2.0-flash-exp:free",
            Some(Usage::new(50, 10)),
        ),
    );

    let ctx = GenerationContext {
        title: Some("Presentes Geek".to_string()),
        category: Some("Geek".to_string()),
        keywords: vec!["presentes".into(), "geek".into()],
        ..Default::default()
    };
    assert_ok!(
        h.state
            .service
            .generate(GenerationRequest::new(UseCase::PostSeoDescription, ctx))
            .await
    );

    let call = &h.dispatch.calls()[0];
    assert!(call.system_prompt.contains("REGRAS:\n- Maximo 160 caracteres"));
    assert!(!call.system_prompt.contains("CONTEXTO"));
    assert_eq!(
        call.user_prompt,
        "Titulo: Presentes Geek\n\nCategoria: Geek\n\nPalavras-chave: presentes, geek"
    );
    assert_eq!(call.model, "openrouter/google/gemini-2.0-flash-exp:free");
}

#[tokio::test]
async fn every_attempt_writes_exactly_one_record() {
    let ok = harness(
        vec![post_title_config()],
        StubDispatch::replying("Title", "vendor-x/model-y", Some(Usage::new(10, 5))),
    );
    let failing = harness(
        vec![post_title_config()],
        StubDispatch::failing(DispatchError::Auth("401: invalid key".to_string())),
    );

    for i in 0..3 {
        let request = GenerationRequest::new(UseCase::PostSeoTitle, titled(&format!("Post {i}")));
        assert_ok!(ok.state.service.generate(request.clone()).await);
        assert_err!(failing.state.service.generate(request).await);
    }

    let successes = LogFilter {
        success: Some(true),
        ..Default::default()
    };
    let failures = LogFilter {
        success: Some(false),
        ..Default::default()
    };

    assert_eq!(assert_ok!(ok.logs.count(&LogFilter::default()).await), 3);
    assert_eq!(assert_ok!(ok.logs.count(&successes).await), 3);
    assert_eq!(assert_ok!(failing.logs.count(&LogFilter::default()).await), 3);
    assert_eq!(assert_ok!(failing.logs.count(&failures).await), 3);

    let failed = failing.logs.snapshot();
    assert!(
        failed
            .iter()
            .all(|r| r.error_message.as_deref().is_some_and(|m| m.contains("401: invalid key")))
    );
    assert_eq!(
        assert_ok!(failing.logs.sum_cost(DateRange::default()).await),
        Decimal::ZERO
    );
}

#[tokio::test]
async fn inactive_config_is_invisible() {
    let h = harness(
        vec![post_title_config().inactive()],
        StubDispatch::replying("Title", "vendor-x/model-y", None),
    );

    let err = assert_err!(
        h.state
            .service
            .generate(GenerationRequest::new(UseCase::PostSeoTitle, titled("x")))
            .await
    );

    assert!(matches!(
        err,
        ServiceError::Generation(GenerationError::ConfigNotFound(UseCase::PostSeoTitle))
    ));
    assert!(h.dispatch.calls().is_empty());
}

#[tokio::test]
async fn config_store_outage_is_recorded() {
    let h = harness(
        vec![post_title_config()],
        StubDispatch::replying("Title", "vendor-x/model-y", None),
    );
    h.configs.set_unavailable(true);

    let err = assert_err!(
        h.state
            .service
            .generate(GenerationRequest::new(UseCase::PostSeoTitle, titled("x")))
            .await
    );

    assert!(matches!(err, ServiceError::Generation(GenerationError::Store(_))));
    assert!(h.dispatch.calls().is_empty());
    assert_eq!(h.logs.snapshot().len(), 1);
}

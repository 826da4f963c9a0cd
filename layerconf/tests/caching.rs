//! Behaviour of collections cached as a whole in a pool.

use std::sync::Arc;

use anyhow::{Result, ensure};
use layerconf::{
    CACHE_KEY, CachePool, CachingCollection, ConfigCollection, ConfigError, MemoryCollection,
    Metadata, MutableConfigCollection, middleware,
};
use rstest::{fixture, rstest};
use serde_json::json;
use test_helpers::{CountingFactory, MemoryPool, PoolCalls};

#[fixture]
fn template() -> MemoryCollection {
    let mut config = MemoryCollection::with_tracking(true);
    config.set(
        "App\\Mailer",
        None,
        json!({"transport": "smtp", "hosts": ["mx1"]}),
        Metadata::new(),
    );
    config
}

#[fixture]
fn pool() -> Arc<MemoryPool> {
    Arc::new(MemoryPool::new())
}

#[rstest]
fn miss_builds_once_and_returns_same_instance(
    template: MemoryCollection,
    pool: Arc<MemoryPool>,
) -> Result<()> {
    let factory = CountingFactory::new(template);
    let config = CachingCollection::builder(pool.clone(), factory.build_fn()).build()?;

    let first = config.collection()?;
    let second = config.collection()?;

    ensure!(Arc::ptr_eq(&first, &second));
    ensure!(factory.calls() == 1);
    ensure!(config.is_dirty());
    ensure!(pool.pending() == 1);
    ensure!(pool.stored(CACHE_KEY).is_none());
    Ok(())
}

#[rstest]
fn close_commits_exactly_once_when_dirty(
    template: MemoryCollection,
    pool: Arc<MemoryPool>,
) -> Result<()> {
    let factory = CountingFactory::new(template);
    let config = CachingCollection::builder(pool.clone(), factory.build_fn()).build()?;
    config.get("app\\mailer", None, true)?;

    config.close()?;

    ensure!(pool.calls().commit == 1);
    ensure!(pool.pending() == 0);
    ensure!(pool.stored(CACHE_KEY).is_some());
    Ok(())
}

#[rstest]
fn clean_collection_never_commits(template: MemoryCollection, pool: Arc<MemoryPool>) -> Result<()> {
    let factory = CountingFactory::new(template);
    let config = CachingCollection::builder(pool.clone(), factory.build_fn()).build()?;

    config.close()?;

    ensure!(factory.calls() == 0);
    ensure!(pool.calls() == PoolCalls::default());
    Ok(())
}

#[rstest]
fn primed_pool_skips_factory(template: MemoryCollection, pool: Arc<MemoryPool>) -> Result<()> {
    pool.prime(CACHE_KEY, template.to_blob()?);
    let factory = CountingFactory::failing();
    let config = CachingCollection::builder(pool.clone(), factory.build_fn()).build()?;

    let hosts = config.get("APP\\MAILER", Some("hosts"), true)?;
    let metadata = config.metadata()?;
    config.close()?;

    ensure!(hosts == Some(json!(["mx1"])));
    ensure!(metadata.contains_key("app\\mailer"));
    ensure!(factory.calls() == 0);
    ensure!(pool.calls().commit == 0);
    Ok(())
}

#[rstest]
fn second_process_reads_what_first_committed(
    template: MemoryCollection,
    pool: Arc<MemoryPool>,
) -> Result<()> {
    let first_factory = CountingFactory::new(template.clone());
    let first = CachingCollection::builder(pool.clone(), first_factory.build_fn()).build()?;
    let from_first = first.get_all()?;
    first.close()?;

    let second_factory = CountingFactory::new(template);
    let second = CachingCollection::builder(pool.clone(), second_factory.build_fn()).build()?;

    ensure!(second.get_all()? == from_first);
    ensure!(first_factory.calls() == 1);
    ensure!(second_factory.calls() == 0);
    second.close()?;
    Ok(())
}

#[rstest]
fn flush_clears_pool_and_rebuilds(template: MemoryCollection, pool: Arc<MemoryPool>) -> Result<()> {
    pool.prime(CACHE_KEY, MemoryCollection::new().to_blob()?);
    pool.prime("unrelated", "1");
    let factory = CountingFactory::new(template);

    let config = CachingCollection::builder(pool.clone(), factory.build_fn())
        .flush(true)
        .build()?;
    ensure!(pool.calls().clear == 1);
    ensure!(pool.keys().is_empty());

    ensure!(config.exists("app\\mailer", None, true)?);
    ensure!(config.is_flush());
    config.close()?;

    ensure!(factory.calls() == 1);
    ensure!(pool.calls().commit == 1);
    Ok(())
}

#[rstest]
fn flush_ignores_entry_written_after_clear(
    template: MemoryCollection,
    pool: Arc<MemoryPool>,
) -> Result<()> {
    let factory = CountingFactory::new(template);
    let config = CachingCollection::builder(pool.clone(), factory.build_fn())
        .flush(true)
        .build()?;
    pool.prime(CACHE_KEY, MemoryCollection::new().to_blob()?);

    ensure!(config.exists("app\\mailer", None, false)?);
    ensure!(factory.calls() == 1);
    config.close()?;
    Ok(())
}

#[rstest]
fn factory_errors_propagate(pool: Arc<MemoryPool>) -> Result<()> {
    let factory = CountingFactory::failing();
    let config = CachingCollection::builder(pool.clone(), factory.build_fn()).build()?;

    let err = config.get("app\\mailer", None, true).err();

    ensure!(matches!(err.as_deref(), Some(ConfigError::Factory { .. })));
    ensure!(!config.is_dirty());
    config.close()?;
    ensure!(pool.calls().save_deferred == 0);
    Ok(())
}

#[rstest]
fn commit_failure_is_reported_by_close(
    template: MemoryCollection,
    pool: Arc<MemoryPool>,
) -> Result<()> {
    pool.fail_commits(true);
    let factory = CountingFactory::new(template);
    let config = CachingCollection::builder(pool.clone(), factory.build_fn()).build()?;
    config.collection()?;

    let err = config.close().err();

    ensure!(matches!(
        err.as_deref(),
        Some(ConfigError::Pool { operation: "commit", .. })
    ));
    ensure!(pool.calls().commit == 1);
    Ok(())
}

#[rstest]
fn scoped_returns_value_and_commits(
    template: MemoryCollection,
    pool: Arc<MemoryPool>,
) -> Result<()> {
    let factory = CountingFactory::new(template);
    let config = CachingCollection::builder(pool.clone(), factory.build_fn()).build()?;

    let transport = config.scoped(|scope| scope.get("app\\mailer", Some("transport"), true))?;

    ensure!(transport == Some(json!("smtp")));
    ensure!(pool.calls().commit == 1);
    Ok(())
}

#[rstest]
fn scoped_commits_even_when_scope_fails(
    template: MemoryCollection,
    pool: Arc<MemoryPool>,
) -> Result<()> {
    let factory = CountingFactory::new(template);
    let config = CachingCollection::builder(pool.clone(), factory.build_fn()).build()?;

    let outcome: layerconf::ConfigResult<()> = config.scoped(|scope| {
        scope.collection()?;
        Err(Arc::new(ConfigError::unknown_extension("page", "ghost")))
    });

    ensure!(matches!(
        outcome.err().as_deref(),
        Some(ConfigError::UnknownExtension { .. })
    ));
    ensure!(pool.calls().commit == 1);
    ensure!(pool.stored(CACHE_KEY).is_some());
    Ok(())
}

#[rstest]
fn scoped_reports_both_failures(template: MemoryCollection, pool: Arc<MemoryPool>) -> Result<()> {
    pool.fail_commits(true);
    let factory = CountingFactory::new(template);
    let config = CachingCollection::builder(pool.clone(), factory.build_fn()).build()?;

    let outcome: layerconf::ConfigResult<()> = config.scoped(|scope| {
        scope.collection()?;
        Err(Arc::new(ConfigError::unknown_extension("page", "ghost")))
    });

    let err = outcome.err();
    let Some(ConfigError::ScopedCommit { scope, commit }) = err.as_deref() else {
        anyhow::bail!("expected a combined scope and commit failure, got {err:?}");
    };
    ensure!(matches!(&**scope, ConfigError::UnknownExtension { .. }));
    ensure!(matches!(&**commit, ConfigError::Pool { .. }));
    Ok(())
}

#[rstest]
fn request_middleware_is_not_cached_in_blob(
    template: MemoryCollection,
    pool: Arc<MemoryPool>,
) -> Result<()> {
    let factory = CountingFactory::new(template);
    let config = CachingCollection::builder(pool.clone(), factory.build_fn())
        .middleware(middleware::from_fn(|class, next| {
            Ok(next.call(class)?.map(|value| json!({"request": value})))
        }))
        .build()?;

    let resolved = config.get("app\\mailer", Some("request"), true)?;
    let raw = config.get("app\\mailer", Some("request"), false)?;
    config.close()?;

    ensure!(resolved.is_some());
    ensure!(raw.is_none());
    let blob = pool.stored(CACHE_KEY).unwrap_or_default();
    let restored = MemoryCollection::from_blob(&blob)?;
    ensure!(restored.get("app\\mailer", Some("request"), true)?.is_none());
    Ok(())
}

#[rstest]
fn nested_overlay_keeps_cache_for_untouched_classes(
    mut template: MemoryCollection,
    pool: Arc<MemoryPool>,
) -> Result<()> {
    template.set("app\\queue", None, json!({"driver": "redis"}), Metadata::new());
    let factory = CountingFactory::new(template);
    let config = CachingCollection::builder(pool.clone(), factory.build_fn())
        .middleware(middleware::from_fn(|class, next| {
            Ok(next.call(class)?.map(|value| json!({"cached": value})))
        }))
        .build()?;

    {
        let mut scoped = config.nest()?;
        scoped.set("app\\mailer", Some("transport"), json!("log"), Metadata::new());

        ensure!(
            scoped.get("app\\queue", None, true)? == Some(json!({"cached": {"driver": "redis"}}))
        );
        ensure!(scoped.get("app\\mailer", Some("transport"), true)? == Some(json!("log")));
    }

    ensure!(config.get("app\\mailer", Some("transport"), false)? == Some(json!("smtp")));
    ensure!(factory.calls() == 1);
    config.close()?;
    Ok(())
}

#[rstest]
fn pool_keys_are_strict_safe() {
    let pool = MemoryPool::new();
    let item = pool.get_item(&layerconf::normalize_cache_key("App\\Model\\Page"));
    assert!(item.is_ok_and(|found| found.key() == "app,model,page" && !found.is_hit()));
}

#[rstest]
fn amendments_after_build_reach_the_committed_blob(
    template: MemoryCollection,
    pool: Arc<MemoryPool>,
) -> Result<()> {
    let factory = CountingFactory::new(template);
    let config = CachingCollection::builder(pool.clone(), factory.build_fn()).build()?;
    let before = config.collection()?;
    ensure!(config.get("app\\mailer", Some("transport"), true)? == Some(json!("smtp")));

    config.amend(|collection| {
        collection.set("app\\mailer", Some("transport"), json!("log"), Metadata::new());
        Ok(())
    })?;

    ensure!(config.get("app\\mailer", Some("transport"), true)? == Some(json!("log")));
    ensure!(before.get("app\\mailer", Some("transport"), true)? == Some(json!("smtp")));
    ensure!(pool.pending() == 1);
    config.close()?;

    ensure!(pool.calls().commit == 1);
    let committed = MemoryCollection::from_blob(&pool.stored(CACHE_KEY).unwrap_or_default())?;
    ensure!(committed.get("app\\mailer", Some("transport"), false)? == Some(json!("log")));
    ensure!(factory.calls() == 1);
    Ok(())
}

#[rstest]
fn amending_a_cached_collection_persists_on_close(
    template: MemoryCollection,
    pool: Arc<MemoryPool>,
) -> Result<()> {
    pool.prime(CACHE_KEY, template.to_blob()?);
    let factory = CountingFactory::failing();
    let config = CachingCollection::builder(pool.clone(), factory.build_fn()).build()?;

    config.amend(|collection| {
        collection.set("app\\queue", None, json!({"driver": "sync"}), Metadata::new());
        Ok(())
    })?;
    ensure!(config.is_dirty());
    config.close()?;

    let committed = MemoryCollection::from_blob(&pool.stored(CACHE_KEY).unwrap_or_default())?;
    ensure!(committed.exists("app\\queue", None, false)?);
    ensure!(pool.calls().commit == 1);
    ensure!(factory.calls() == 0);
    Ok(())
}

#[rstest]
fn failed_amendment_leaves_collection_unchanged(
    template: MemoryCollection,
    pool: Arc<MemoryPool>,
) -> Result<()> {
    let factory = CountingFactory::new(template);
    let config = CachingCollection::builder(pool.clone(), factory.build_fn()).build()?;

    let outcome: layerconf::ConfigResult<()> = config.amend(|collection| {
        collection.remove("app\\mailer", None);
        Err(Arc::new(ConfigError::factory("setup aborted")))
    });
    let with_middleware = config.amend(|collection| {
        collection.add_middleware(middleware::from_fn(|class, next| next.call(class)));
        Ok(())
    });

    ensure!(matches!(outcome.err().as_deref(), Some(ConfigError::Factory { .. })));
    ensure!(matches!(
        with_middleware.err().as_deref(),
        Some(ConfigError::MiddlewareSerialization)
    ));
    ensure!(config.exists("app\\mailer", None, true)?);
    config.close()?;
    let committed = MemoryCollection::from_blob(&pool.stored(CACHE_KEY).unwrap_or_default())?;
    ensure!(committed.exists("app\\mailer", None, false)?);
    Ok(())
}

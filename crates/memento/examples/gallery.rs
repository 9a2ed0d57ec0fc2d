//! Memento Gallery Example
//!
//! Drives a small video gallery with scripted media elements:
//! - registry loaded from TOML
//! - visibility-driven loading with an unreachable entry
//! - muted autoplay fallback
//! - auto-advance on `ended`
//! - debug report
//!
//! Run with: RUST_LOG=memento_media=debug cargo run -p memento --example gallery

use std::sync::Arc;
use std::time::Duration;

use memento::media::testing::{PlayScript, ScriptedFactory, StaticProbe};
use memento::prelude::*;
use tracing_subscriber::EnvFilter;

const REGISTRY: &str = r#"
[hero_video]
key = "hero"
url = "https://cdn.example.com/hero.mp4"
title = "Welcome"

[[videos]]
key = "garden"
url = "https://cdn.example.com/garden.mp4"
title = "The garden"
duration = 42.0

[[videos]]
key = "lake"
url = "https://example.invalid/lake.mp4"
title = "Summer at the lake"

[[videos]]
key = "letters"
url = "https://cdn.example.com/letters.mp4"
title = "Letters"
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let registry = AssetRegistry::from_toml(REGISTRY)?;

    let probe = StaticProbe::new();
    probe.unreachable("https://example.invalid/lake.mp4");
    let factory = ScriptedFactory::new();
    factory.set_play_script(PlayScript::BlockUnmuted);

    let context = MediaContext::new(Arc::new(probe), Arc::new(factory.clone()));
    let gallery = VisibilityScheduler::with_assets(
        context,
        AdvancePolicy::Stop,
        registry.assets(Category::Videos),
    )?;
    let _advance = AutoAdvance::attach(&gallery);
    let introspection = DebugIntrospection::for_scheduler(&gallery);

    gallery.events().connect(|event| match event {
        SchedulerEvent::CurrentChanged { current, .. } => println!("now showing {current}"),
        SchedulerEvent::SequenceFinished { last } => println!("gallery finished at {last}"),
        _ => {}
    });

    for id in ["garden", "lake", "letters"] {
        gallery.on_visibility(&id.into(), 0.8).await;
    }

    gallery.select(&"garden".into()).await?;
    match gallery.play().await {
        Some(PlayResult::Playing { muted_fallback }) => {
            println!("garden playing (muted fallback: {muted_fallback})");
        }
        Some(PlayResult::Failed(err)) => println!("garden failed: {err}"),
        _ => {}
    }

    if let Some(element) = factory.element_for("https://cdn.example.com/garden.mp4") {
        element.finish();
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    print!("{}", introspection.report());
    Ok(())
}

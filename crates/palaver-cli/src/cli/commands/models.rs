//! Models command handler.

use std::sync::Arc;

use anyhow::{Context, Result};
use palaver_core::api::catalog::ModelIcon;
use palaver_core::store::SessionStore;

pub async fn list(store: &Arc<SessionStore>) -> Result<()> {
    store
        .refresh_models()
        .await
        .context("fetch model catalog")?;

    let models = store.models();
    if models.is_empty() {
        println!("No models available.");
        return Ok(());
    }
    for model in models {
        match model.icon {
            Some(icon) => println!("{:<40} {}", model.name, vendor_label(icon)),
            None => println!("{}", model.name),
        }
    }
    Ok(())
}

fn vendor_label(icon: ModelIcon) -> &'static str {
    match icon {
        ModelIcon::OpenAi => "openai",
        ModelIcon::Anthropic => "anthropic",
        ModelIcon::Gemini => "google",
        ModelIcon::Meta => "meta",
        ModelIcon::Mistral => "mistral",
        ModelIcon::DeepSeek => "deepseek",
    }
}

//! `parley models`: list the registered (provider, model) backends.

use std::sync::Arc;

use parley_config::AppConfig;
use parley_memory::WindowChatMemory;
use parley_providers::{BackendRegistry, ProviderKind, build_from_config};

pub fn run(config: &AppConfig) {
    let registry = build_from_config(config, Arc::new(WindowChatMemory::new(config.chat_memory.window)));
    print!("{}", render(&registry, config));
}

fn render(registry: &BackendRegistry, config: &AppConfig) -> String {
    let mut out = String::from("Registered backends\n===================\n");
    for kind in ProviderKind::ALL {
        let models: Vec<String> = registry
            .list()
            .into_iter()
            .filter(|b| b.provider == kind)
            .map(|b| b.model)
            .collect();
        if models.is_empty() {
            out.push_str(&format!("  {kind:<8} (none)\n"));
            continue;
        }
        for model in models {
            let marker = if kind.as_str() == config.default_provider && model == config.default_model {
                " (default)"
            } else {
                ""
            };
            out.push_str(&format!("  {kind:<8} {model}{marker}\n"));
        }
    }
    out
}

use std::error::Error;

use crate::core::config::Config;
use crate::core::personality::PersonalityRegistry;

pub fn list_personalities() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let registry = PersonalityRegistry::with_overrides(&config.personalities);
    let default_id = config
        .default_personality
        .as_deref()
        .or(registry.default_id())
        .unwrap_or_default()
        .to_string();

    println!("Available personalities:\n");
    for line in format_personalities(&registry, &default_id) {
        println!("{line}");
    }
    println!("\n* = default personality");
    Ok(())
}

fn format_personalities(registry: &PersonalityRegistry, default_id: &str) -> Vec<String> {
    registry
        .list()
        .iter()
        .map(|personality| {
            let marker = if personality.id.eq_ignore_ascii_case(default_id) {
                "*"
            } else {
                " "
            };
            format!(
                "{marker} {:<10} {:<10} {:<9} {}",
                personality.id, personality.display_name, personality.backend, personality.description
            )
        })
        .collect()
}

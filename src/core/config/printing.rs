use crate::core::config::data::{path_display, Config};

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.default_personality {
            Some(personality) => println!("  default-personality: {personality}"),
            None => println!("  default-personality: (unset)"),
        }
        match self.starts_encrypted() {
            true => println!("  encrypted: on"),
            false => println!("  encrypted: off"),
        }
        match &self.sessions_dir {
            Some(dir) => println!("  sessions-dir: {}", path_display(dir)),
            None => println!("  sessions-dir: (default)"),
        }
        if self.backends.is_empty() {
            println!("  backends: (no overrides)");
        } else {
            println!("  backends:");
            let mut ids: Vec<&String> = self.backends.keys().collect();
            ids.sort();
            for id in ids {
                let settings = &self.backends[id];
                let model = settings.model.as_deref().unwrap_or("(default model)");
                let url = settings.base_url.as_deref().unwrap_or("(default url)");
                let key = if settings.api_key.is_some() { ", api key set" } else { "" };
                println!("    {id}: {model} @ {url}{key}");
            }
        }
        if !self.personalities.is_empty() {
            let ids: Vec<&str> = self.personalities.iter().map(|p| p.id.as_str()).collect();
            println!("  custom personalities: {}", ids.join(", "));
        }
    }
}

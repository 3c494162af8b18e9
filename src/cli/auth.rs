use std::error::Error;
use std::io::{self, BufRead, Write};

use crate::core::backends::{find_backend_spec, BackendSpec, BUILTIN_BACKENDS};
use crate::core::keyring::{delete_api_key, store_api_key};

fn resolve_backend(id: &str) -> Result<&'static BackendSpec, Box<dyn Error>> {
    find_backend_spec(id).ok_or_else(|| {
        let known: Vec<&str> = BUILTIN_BACKENDS.iter().map(|spec| spec.id).collect();
        format!("Unknown backend: {id}. Available: {}", known.join(", ")).into()
    })
}

/// Read an API key from stdin and store it in the system keyring.
pub fn run_auth(backend: &str) -> Result<(), Box<dyn Error>> {
    let spec = resolve_backend(backend)?;
    if !spec.requires_api_key() {
        return Err(format!(
            "{} does not use the keyring. If your server needs a key, set it under [backends.{}] api_key in the config file.",
            spec.display_name, spec.id
        )
        .into());
    }

    print!("Enter API key for {}: ", spec.display_name);
    io::stdout().flush()?;
    let mut key = String::new();
    io::stdin().lock().read_line(&mut key)?;
    let key = key.trim();
    if key.is_empty() {
        return Err("API key cannot be empty".into());
    }

    store_api_key(spec.id, key)?;
    println!("✓ API key stored securely for {}", spec.display_name);
    Ok(())
}

pub fn run_deauth(backend: &str) -> Result<(), Box<dyn Error>> {
    let spec = resolve_backend(backend)?;
    if delete_api_key(spec.id)? {
        println!("✅ Removed stored API key for {}", spec.display_name);
    } else {
        println!("No stored API key for {}", spec.display_name);
    }
    Ok(())
}

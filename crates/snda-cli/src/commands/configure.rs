//! configure command - manage profiles

use super::CommandContext;
use crate::config::Profile;
use crate::ConfigureAction;
use anyhow::Result;
use colored::Colorize;
use std::io::{self, Write};

pub fn execute(ctx: &CommandContext, action: Option<ConfigureAction>) -> Result<()> {
    let name = ctx.profile_name.as_deref();
    match action {
        Some(ConfigureAction::Set { key, value }) => set_config(name, &key, &value),
        Some(ConfigureAction::Get { key }) => get_config(name, &key),
        Some(ConfigureAction::List) => list_config(name),
        None => interactive_configure(name),
    }
}

fn set_config(name: Option<&str>, key: &str, value: &str) -> Result<()> {
    let path = Profile::config_path()?;
    let mut profile = Profile::load_from(&path, name)?;
    profile.set_value(key, value)?;
    profile.save_to(&path, name)?;
    println!("Set {} = {}", key.cyan(), value);
    Ok(())
}

fn get_config(name: Option<&str>, key: &str) -> Result<()> {
    let profile = Profile::load(name)?;
    match profile.get_value(key) {
        Some(value) => println!("{}", value),
        None => println!("(not set)"),
    }
    Ok(())
}

fn list_config(name: Option<&str>) -> Result<()> {
    let profile = Profile::load(name)?;

    println!("{}", "Current configuration:".bold());
    println!();
    for key in Profile::keys() {
        let value = profile
            .get_value(key)
            .unwrap_or_else(|| "(not set)".to_string());
        println!("  {}: {}", key.cyan(), value);
    }

    println!();
    println!("{}", "Available profiles:".bold());
    let profiles = Profile::list_profiles()?;
    if profiles.is_empty() {
        println!("  (none)");
    } else {
        for profile in profiles {
            println!("  - {}", profile);
        }
    }

    println!();
    println!(
        "Config file: {}",
        Profile::config_path()?.display().to_string().dimmed()
    );
    Ok(())
}

fn prompt(label: &str, current: &str) -> Result<Option<String>> {
    print!("{} [{}]: ", label, current);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    Ok((!input.is_empty()).then(|| input.to_string()))
}

fn interactive_configure(name: Option<&str>) -> Result<()> {
    println!("{}", "snda CLI configuration".bold());
    println!("Press Enter to keep current value.\n");

    let path = Profile::config_path()?;
    let mut profile = Profile::load_from(&path, name).unwrap_or_default();

    if let Some(endpoint) = prompt("Endpoint", profile.endpoint.as_deref().unwrap_or(""))? {
        profile.endpoint = Some(endpoint);
    }
    if let Some(access_key) = prompt("Access Key", profile.access_key.as_deref().unwrap_or(""))? {
        profile.access_key = Some(access_key);
    }
    let masked = if profile.secret_key.is_some() { "***" } else { "" };
    if let Some(secret_key) = prompt("Secret Key", masked)? {
        profile.secret_key = Some(secret_key);
    }
    if let Some(region) = prompt("Region", &profile.region.clone())? {
        profile.region = region;
    }

    profile.save_to(&path, name)?;

    println!();
    println!("{} Configuration saved to {}", "✓".green(), path.display());
    Ok(())
}

//! `askai config`: show the effective configuration.

use crate::state::AppState;

pub fn show_config(state: &AppState, json: bool) -> anyhow::Result<()> {
    let path = state.config_file();
    let exists = path.exists();

    if json {
        let output = serde_json::json!({
            "config_file": path.display().to_string(),
            "file_exists": exists,
            "config": state.config,
            "primary_url": state.config.primary_url(),
            "secondary_url": state.config.secondary_url(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let origin = if exists {
        format!("# {}", path.display())
    } else {
        format!("# {} (not found, using defaults)", path.display())
    };
    println!("{}", console::style(origin).dim());
    print!("{}", toml::to_string_pretty(&state.config)?);
    println!();
    println!(
        "{}",
        console::style(format!("# primary:   {}", state.config.primary_url())).dim()
    );
    println!(
        "{}",
        console::style(format!("# secondary: {}", state.config.secondary_url())).dim()
    );
    Ok(())
}

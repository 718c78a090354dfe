use anyhow::Result;

use crate::config::Settings;

pub fn run_status(settings: &Settings) -> Result<()> {
    println!("{:<12} {:<20} {:<8} TENANTS", "INSTANCE", "NAMESPACE", "ROLE");
    for (name, instance) in &settings.instances {
        println!(
            "{:<12} {:<20} {:<8} {}",
            name,
            instance.namespace,
            instance.role.as_deref().unwrap_or("-"),
            instance.tenants.len()
        );
    }

    println!();
    println!("{:<12} {:<40} AUTH", "ENDPOINT", "URL");
    println!("{:<12} {:<40} {}", "dbaas", settings.dbaas.url, settings.dbaas.auth);
    println!("{:<12} {:<40} {}", "backup", settings.backup.url, settings.backup.auth);

    if !settings.guard.deny.is_empty() {
        println!();
        println!("{:<24} NAMESPACE", "DENY ENDPOINT");
        for rule in &settings.guard.deny {
            println!("{:<24} {}", rule.endpoint, rule.namespace);
        }
    }

    let files_status = |path: &std::path::Path| if path.exists() { "present" } else { "absent" };
    println!();
    println!(
        "data config: {} ({})",
        settings.files.data_config.display(),
        files_status(&settings.files.data_config)
    );
    println!(
        "mapping:     {} ({})",
        settings.files.mapping.display(),
        files_status(&settings.files.mapping)
    );

    Ok(())
}

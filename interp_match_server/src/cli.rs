use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "IMS_DATABASE_URL",
        "IMS_WORKER_COUNT",
        "IMS_POLL_INTERVAL_MS",
        "IMS_JOB_BATCH_SIZE",
        "IMS_MIGRATE_ON_STARTUP",
        "IMS_EVENT_BUFFER_SIZE",
        "IMS_ON_DEMAND_REPEAT_INTERVAL",
        "IMS_ON_DEMAND_MAX_REPEATS",
        "IMS_PRE_BOOKED_REPEAT_INTERVAL",
        "IMS_PRE_BOOKED_MAX_REPEATS",
        "IMS_MAX_DELIVERY_ATTEMPTS",
        "IMS_ADMIN_ALERT_WEBHOOK",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(value) if name.ends_with("WEBHOOK") => {
                if value.is_empty() {
                    "Not set".to_string()
                } else {
                    "****".to_string()
                }
            },
            Ok(value) => value,
            Err(VarError::NotPresent) => "Not set".to_string(),
            Err(VarError::NotUnicode(_)) => "Not valid unicode".to_string(),
        };
        println!("{name}: {val}");
    });
}
